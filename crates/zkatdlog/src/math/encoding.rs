//! Serde adapters for curve points and field elements
//!
//! Elements are written as lowercase hex of their canonical compressed
//! arkworks encoding. Use them through `#[serde(with = "...")]`.

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

fn decode<'de, D, T>(s: &str) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: CanonicalDeserialize,
{
    let bytes = hex::decode(s).map_err(D::Error::custom)?;
    T::deserialize_compressed(&bytes[..]).map_err(|e| D::Error::custom(e.to_string()))
}

/// A single element
pub mod canonical {
    use super::*;

    pub fn serialize<S, T>(v: &T, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: CanonicalSerialize,
    {
        s.serialize_str(&hex::encode(crate::math::to_bytes(v)))
    }

    pub fn deserialize<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: CanonicalDeserialize,
    {
        let s = String::deserialize(d)?;
        decode::<D, T>(&s)
    }
}

/// A vector of elements
pub mod canonical_vec {
    use super::*;
    use serde::ser::SerializeSeq;

    pub fn serialize<S, T>(v: &[T], s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: CanonicalSerialize,
    {
        let mut seq = s.serialize_seq(Some(v.len()))?;
        for e in v {
            seq.serialize_element(&hex::encode(crate::math::to_bytes(e)))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: CanonicalDeserialize,
    {
        let v = Vec::<String>::deserialize(d)?;
        v.iter().map(|s| decode::<D, T>(s)).collect()
    }
}

/// An optional element, `null` when absent
pub mod canonical_opt {
    use super::*;

    pub fn serialize<S, T>(v: &Option<T>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: CanonicalSerialize,
    {
        match v {
            Some(e) => s.serialize_some(&hex::encode(crate::math::to_bytes(e))),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: CanonicalDeserialize,
    {
        match Option::<String>::deserialize(d)? {
            Some(s) => decode::<D, T>(&s).map(Some),
            None => Ok(None),
        }
    }
}

/// A list of byte blobs, each as a hex string
pub mod hex_vec {
    use super::*;
    use serde::ser::SerializeSeq;

    pub fn serialize<S>(v: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = s.serialize_seq(Some(v.len()))?;
        for e in v {
            seq.serialize_element(&hex::encode(e))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Vec<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Vec::<String>::deserialize(d)?;
        v.iter().map(|s| hex::decode(s).map_err(D::Error::custom)).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::math::{encoding, rand_g1, rand_zr, G1, Zr};
    use rand::rngs::OsRng;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "encoding::canonical")]
        point: G1,
        #[serde(with = "encoding::canonical_vec")]
        scalars: Vec<Zr>,
        #[serde(with = "encoding::canonical_opt", default)]
        extra: Option<G1>,
    }

    #[test]
    fn test_json_encoding() {
        let sample = Sample {
            point: rand_g1(&mut OsRng),
            scalars: vec![rand_zr(&mut OsRng), rand_zr(&mut OsRng)],
            extra: None,
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert!(json.contains("\"extra\":null"));
        let back: Sample = serde_json::from_str(&json).unwrap();
        assert_eq!(sample, back);
    }

    #[test]
    fn test_rejects_bad_hex() {
        let json = r#"{"point":"zz","scalars":[],"extra":null}"#;
        assert!(serde_json::from_str::<Sample>(json).is_err());
    }
}
