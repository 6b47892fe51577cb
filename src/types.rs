use serde::{Deserialize, Serialize};

/// Index of a trial within one run-set. Also selects the trial's random stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrialId(pub u64);

/// Simulated month, 1-based. Month 1 is the first month after the starting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Month(pub u32);

impl Month {
    pub const FIRST: Month = Month(1);

    pub fn next(self) -> Self {
        Month(self.0 + 1)
    }
}

/// Monthly revenue earned per client.
pub const REVENUE_PER_CLIENT: f64 = 10.0;

/// Client base every trial (and every competitor) starts from.
pub const INITIAL_CLIENTS: f64 = 100.0;

/// Serde representation for `f64` values that may overflow.
///
/// Finite values stay JSON numbers; `inf`, `-inf` and `NaN` are written as
/// strings so they read back instead of collapsing to `null`.
pub mod lossless_f64 {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    impl Repr {
        fn into_f64<E: Error>(self) -> Result<f64, E> {
            match self {
                Repr::Number(v) => Ok(v),
                Repr::Text(s) => s
                    .parse::<f64>()
                    .ok()
                    .filter(|v| !v.is_finite())
                    .ok_or_else(|| E::custom(format!("expected a number, inf, -inf or NaN, got {s:?}"))),
            }
        }
    }

    struct Lossless(f64);

    impl Serialize for Lossless {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            if self.0.is_finite() {
                serializer.serialize_f64(self.0)
            } else {
                serializer.serialize_str(&self.0.to_string())
            }
        }
    }

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Lossless(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Repr::deserialize(deserializer)?.into_f64()
    }

    /// Same representation, element-wise over a `Vec<f64>`.
    pub mod vec {
        use serde::{Deserialize, Deserializer, Serializer};

        use super::{Lossless, Repr};

        pub fn serialize<S>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.collect_seq(values.iter().map(|&v| Lossless(v)))
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Vec::<Repr>::deserialize(deserializer)?.into_iter().map(Repr::into_f64).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_next_advances_by_one() {
        assert_eq!(Month::FIRST.next(), Month(2));
    }

    #[test]
    fn newtypes_serialize_as_bare_numbers() {
        assert_eq!(serde_json::to_string(&Month(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&TrialId(3)).unwrap(), "3");
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "lossless_f64")]
        value: f64,
        #[serde(with = "lossless_f64::vec")]
        values: Vec<f64>,
    }

    #[test]
    fn lossless_f64_keeps_finite_values_numeric() {
        let json = serde_json::to_string(&Sample { value: -2.5, values: vec![1.0, 3.0] }).unwrap();
        assert_eq!(json, r#"{"value":-2.5,"values":[1.0,3.0]}"#);
        let back: Sample = serde_json::from_str(r#"{"value":7,"values":[1,-0.5]}"#).unwrap();
        assert_eq!(back, Sample { value: 7.0, values: vec![1.0, -0.5] });
    }

    #[test]
    fn lossless_f64_round_trips_non_finite_values() {
        let sample = Sample { value: f64::INFINITY, values: vec![f64::NEG_INFINITY, 4.0] };
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(json, r#"{"value":"inf","values":["-inf",4.0]}"#);
        assert_eq!(serde_json::from_str::<Sample>(&json).unwrap(), sample);

        let nan = Sample { value: f64::NAN, values: vec![] };
        let back: Sample = serde_json::from_str(&serde_json::to_string(&nan).unwrap()).unwrap();
        assert!(back.value.is_nan());
    }

    #[test]
    fn lossless_f64_rejects_other_strings() {
        assert!(serde_json::from_str::<Sample>(r#"{"value":"12","values":[]}"#).is_err());
        assert!(serde_json::from_str::<Sample>(r#"{"value":"cash","values":[]}"#).is_err());
        assert!(serde_json::from_str::<Sample>(r#"{"value":null,"values":[]}"#).is_err());
    }
}
