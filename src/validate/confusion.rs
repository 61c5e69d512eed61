use serde::{Serialize, Serializer};
use std::fmt;

/// A proportion that may have no denominator.
///
/// Zero denominators produce `Undefined` instead of NaN or 0 so that a
/// missing rate can never be mistaken for a measured one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rate {
    Value(f64),
    Undefined,
}

impl Rate {
    pub fn ratio(numerator: usize, denominator: usize) -> Self {
        if denominator == 0 {
            Rate::Undefined
        } else {
            Rate::Value(numerator as f64 / denominator as f64)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Rate::Value(v) => Some(*v),
            Rate::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Rate::Value(_))
    }

    /// `self - other`, undefined if either side is
    pub fn delta(&self, other: &Rate) -> Rate {
        match (self, other) {
            (Rate::Value(a), Rate::Value(b)) => Rate::Value(a - b),
            _ => Rate::Undefined,
        }
    }

    pub fn percent(&self) -> Rate {
        match self {
            Rate::Value(v) => Rate::Value(v * 100.0),
            Rate::Undefined => Rate::Undefined,
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rate::Value(v) => write!(f, "{:.4}", v),
            Rate::Undefined => f.write_str("NA"),
        }
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Rate::Value(v) => serializer.serialize_f64(*v),
            Rate::Undefined => serializer.serialize_str("NA"),
        }
    }
}

/// 2x2 contingency table of a binary prediction against the collapse label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tn: usize,
}

impl ConfusionMatrix {
    pub fn new(tp: usize, fp: usize, fn_: usize, tn: usize) -> Self {
        Self { tp, fp, fn_, tn }
    }

    /// Tally `(predicted, actual)` pairs
    pub fn from_pairs(pairs: impl IntoIterator<Item = (bool, bool)>) -> Self {
        let mut matrix = Self::default();
        for pair in pairs {
            matrix.add(pair.0, pair.1);
        }
        matrix
    }

    pub fn add(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true, true) => self.tp += 1,
            (true, false) => self.fp += 1,
            (false, true) => self.fn_ += 1,
            (false, false) => self.tn += 1,
        }
    }

    pub fn n(&self) -> usize {
        self.tp + self.fp + self.fn_ + self.tn
    }

    pub fn actual_positives(&self) -> usize {
        self.tp + self.fn_
    }

    pub fn actual_negatives(&self) -> usize {
        self.fp + self.tn
    }

    pub fn sensitivity(&self) -> Rate {
        Rate::ratio(self.tp, self.actual_positives())
    }

    pub fn specificity(&self) -> Rate {
        Rate::ratio(self.tn, self.actual_negatives())
    }

    pub fn false_positive_rate(&self) -> Rate {
        Rate::ratio(self.fp, self.actual_negatives())
    }

    pub fn ppv(&self) -> Rate {
        Rate::ratio(self.tp, self.tp + self.fp)
    }

    pub fn npv(&self) -> Rate {
        Rate::ratio(self.tn, self.tn + self.fn_)
    }

    pub fn accuracy(&self) -> Rate {
        Rate::ratio(self.tp + self.tn, self.n())
    }

    pub fn metrics(&self) -> ClassificationMetrics {
        ClassificationMetrics {
            sensitivity: self.sensitivity(),
            specificity: self.specificity(),
            ppv: self.ppv(),
            npv: self.npv(),
            accuracy: self.accuracy(),
        }
    }
}

/// The five headline metrics of a contingency table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationMetrics {
    pub sensitivity: Rate,
    pub specificity: Rate,
    pub ppv: Rate,
    pub npv: Rate,
    pub accuracy: Rate,
}

impl ClassificationMetrics {
    pub fn named(&self) -> [(&'static str, Rate); 5] {
        [
            ("sensitivity", self.sensitivity),
            ("specificity", self.specificity),
            ("ppv", self.ppv),
            ("npv", self.npv),
            ("accuracy", self.accuracy),
        ]
    }
}
