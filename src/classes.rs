//! The fixed binary taxonomy and its index mapping

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CheckpointDefect;

/// One of the two diagnoses the model can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Normal,
    Pneumonia,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Normal => "NORMAL",
            Label::Pneumonia => "PNEUMONIA",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    /// Exact, case-sensitive match against the checkpoint spelling
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NORMAL" => Ok(Label::Normal),
            "PNEUMONIA" => Ok(Label::Pneumonia),
            other => Err(format!("unknown class `{}`", other)),
        }
    }
}

/// Class order as declared by the checkpoint, with both indices resolved once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassIndex {
    order: [Label; 2],
    normal: usize,
    pneumonia: usize,
}

impl ClassIndex {
    /// Validate that `names` is exactly a permutation of NORMAL and PNEUMONIA.
    ///
    /// The declared order is kept as-is; it is never assumed to be alphabetical.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, CheckpointDefect> {
        let reject = || {
            CheckpointDefect::WrongClasses(names.iter().map(|n| n.as_ref().to_string()).collect())
        };

        if names.len() != 2 {
            return Err(reject());
        }

        let first: Label = names[0].as_ref().parse().map_err(|_| reject())?;
        let second: Label = names[1].as_ref().parse().map_err(|_| reject())?;
        if first == second {
            return Err(reject());
        }

        let order = [first, second];
        let normal = if first == Label::Normal { 0 } else { 1 };
        Ok(Self {
            order,
            normal,
            pneumonia: 1 - normal,
        })
    }

    pub fn index_of(&self, label: Label) -> usize {
        match label {
            Label::Normal => self.normal,
            Label::Pneumonia => self.pneumonia,
        }
    }

    pub fn label_at(&self, index: usize) -> Option<Label> {
        self.order.get(index).copied()
    }

    /// Labels in checkpoint order
    pub fn order(&self) -> [Label; 2] {
        self.order
    }

    pub fn names(&self) -> Vec<String> {
        self.order.iter().map(|l| l.as_str().to_string()).collect()
    }
}
