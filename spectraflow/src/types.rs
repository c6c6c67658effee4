use derive_more::Display;
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::time::Stamp;

/// A zoom-FFT magnitude spectrum together with its frequency axis and the
/// band it was analysed over.
#[derive(new, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumFrame {
    pub freqs: Vec<f64>,
    pub mags: Vec<f64>,
    pub band: (f64, f64),
}

/// A rolling matrix of spectra, one row per analysed window, plus the
/// timestamp each row was taken at.
#[derive(new, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryFrame {
    pub rows: Vec<Vec<f64>>,
    pub times: Vec<Stamp>,
}

impl HistoryFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The tagged value carried by every parameter, input and output port.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Time(Vec<Stamp>),
    Real(Vec<f64>),
    Scalar(f64),
    Spectrum(SpectrumFrame),
    History(HistoryFrame),
    Bool(bool),
    Text(String),
    Texts(Vec<String>),
}

/// The variant tag of a [Value].  Ports declare a kind up front; the graph
/// rejects edges whose endpoint kinds disagree, and setters reject values
/// of the wrong kind.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize, Deserialize)]
pub enum Kind {
    Time,
    Real,
    Scalar,
    Spectrum,
    History,
    Bool,
    Text,
    Texts,
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Time(_) => Kind::Time,
            Value::Real(_) => Kind::Real,
            Value::Scalar(_) => Kind::Scalar,
            Value::Spectrum(_) => Kind::Spectrum,
            Value::History(_) => Kind::History,
            Value::Bool(_) => Kind::Bool,
            Value::Text(_) => Kind::Text,
            Value::Texts(_) => Kind::Texts,
        }
    }

    pub fn as_time(&self) -> Option<&[Stamp]> {
        match self {
            Value::Time(stamps) => Some(stamps),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<&[f64]> {
        match self {
            Value::Real(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_spectrum(&self) -> Option<&SpectrumFrame> {
        match self {
            Value::Spectrum(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_history(&self) -> Option<&HistoryFrame> {
        match self {
            Value::History(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_texts(&self) -> Option<&[String]> {
        match self {
            Value::Texts(texts) => Some(texts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn kinds_match_variants() {
        assert_eq!(Value::Scalar(1.0).kind(), Kind::Scalar);
        assert_eq!(Value::Real(vec![]).kind(), Kind::Real);
        assert_eq!(Value::Bool(true).kind(), Kind::Bool);
        assert_eq!(Value::Text(String::new()).kind(), Kind::Text);
        assert_eq!(Value::History(HistoryFrame::default()).kind(), Kind::History);
    }

    #[test]
    fn accessors_reject_wrong_variant() {
        assert!(Value::Scalar(1.0).as_real().is_none());
        assert_eq!(Value::Scalar(2.5).as_scalar(), Some(2.5));
    }
}
