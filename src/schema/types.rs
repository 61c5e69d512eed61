/// Column data type as declared in the source dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

/// Column definition
#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub col_type: ColumnType,
    pub nullable: bool,
}

impl Column {
    /// Create an optional (nullable) column
    pub const fn new(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: true,
        }
    }

    /// Create a required (non-nullable) column
    pub const fn required(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: false,
        }
    }
}

/// Table schema definition
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [Column],
    /// Column holding the stock key, used for joins and indexes
    pub key_column: &'static str,
}

impl TableSchema {
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Generate CREATE TABLE SQL for this schema
    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|col| {
                let null_constraint = if !col.nullable { " NOT NULL" } else { "" };
                format!("    {} {}{}", col.name, col.col_type.sql_type(), null_constraint)
            })
            .collect();

        format!("CREATE TABLE {} (\n{}\n)", self.name, columns.join(",\n"))
    }

    /// Generate the CREATE INDEX statement for the stock key
    pub fn create_index_sql(&self) -> String {
        format!(
            "CREATE INDEX idx_{}_{} ON {}({})",
            self.name, self.key_column, self.name, self.key_column
        )
    }
}
