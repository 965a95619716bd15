//! Driver registry
//!
//! Public parameters travel in an envelope naming the driver that
//! understands them. The registry maps that name to the functions able to
//! parse the parameters and to build a [`Validator`] over them.

use std::collections::HashMap;

use log::debug;

use crate::error::{Result, ResultExt, ZkatError};
use crate::identity::Deserializer;
use crate::setup::{PublicParams, SerializedPublicParameters, DLOG_PUBLIC_PARAMETERS};
use crate::validator::Validator;

/// Parses and validates serialized public parameters
pub type PublicParamsDeserializer = fn(&[u8]) -> Result<PublicParams>;

/// Builds a validator over loaded public parameters
pub type ValidatorFactory = fn(PublicParams, Box<dyn Deserializer>) -> Result<Validator>;

#[derive(Clone, Copy)]
pub struct Driver {
    pub public_params: PublicParamsDeserializer,
    pub validator: ValidatorFactory,
}

/// The discrete-log driver
pub fn zkatdlog_driver() -> Driver {
    Driver {
        public_params: |raw| {
            let pp = PublicParams::deserialize(raw, DLOG_PUBLIC_PARAMETERS)?;
            pp.validate().context(|| "invalid public parameters")?;
            Ok(pp)
        },
        validator: Validator::new,
    }
}

pub struct DriverRegistry {
    drivers: HashMap<String, Driver>,
}

impl Default for DriverRegistry {
    /// Registry with the `zkatdlog` driver
    fn default() -> Self {
        let mut drivers = HashMap::new();
        drivers.insert(DLOG_PUBLIC_PARAMETERS.to_string(), zkatdlog_driver());
        Self { drivers }
    }
}

impl DriverRegistry {
    /// Registry without drivers
    pub fn empty() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, driver: Driver) -> Result<()> {
        let name = name.into();
        if self.drivers.contains_key(&name) {
            return Err(ZkatError::Registry(format!("driver [{}] already registered", name)));
        }
        debug!("registering driver [{}]", name);
        self.drivers.insert(name, driver);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Driver> {
        self.drivers
            .get(name)
            .ok_or_else(|| ZkatError::Registry(format!("driver [{}] not found", name)))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Loads parameters with the driver their envelope names
    pub fn public_parameters_from_bytes(&self, raw: &[u8]) -> Result<PublicParams> {
        if raw.is_empty() {
            return Err(ZkatError::InvalidInput("empty public parameters".into()));
        }
        let envelope: SerializedPublicParameters = serde_json::from_slice(raw)
            .map_err(ZkatError::from)
            .context(|| "failed to unmarshal public parameters envelope")?;
        let driver = self
            .get(&envelope.identifier)
            .context(|| "cannot load public parameters")?;
        (driver.public_params)(raw)
    }

    pub fn new_validator(&self, raw_pp: &[u8], deserializer: Box<dyn Deserializer>) -> Result<Validator> {
        let pp = self.public_parameters_from_bytes(raw_pp)?;
        let driver = self.get(pp.identifier())?;
        (driver.validator)(pp, deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SetupConfig;
    use crate::identity::schnorr::SchnorrDeserializer;
    use crate::setup::setup;
    use rand::rngs::OsRng;

    #[test]
    fn test_duplicate_registration() {
        let mut registry = DriverRegistry::default();
        assert_eq!(registry.names(), vec![DLOG_PUBLIC_PARAMETERS]);
        let err = registry.register(DLOG_PUBLIC_PARAMETERS, zkatdlog_driver()).unwrap_err();
        assert_eq!(err.to_string(), "driver [zkatdlog] already registered");

        registry.register("custom", zkatdlog_driver()).unwrap();
        assert_eq!(registry.names(), vec!["custom", DLOG_PUBLIC_PARAMETERS]);
    }

    #[test]
    fn test_new_validator() {
        let pp = setup(&SetupConfig::bulletproof(8), &mut OsRng).unwrap();
        let raw = pp.serialize().unwrap();

        let registry = DriverRegistry::default();
        let validator = registry.new_validator(&raw, Box::new(SchnorrDeserializer)).unwrap();
        assert_eq!(validator.public_params(), &pp);

        assert!(DriverRegistry::empty()
            .new_validator(&raw, Box::new(SchnorrDeserializer))
            .is_err());
        assert!(registry.public_parameters_from_bytes(&[]).is_err());
    }

    #[test]
    fn test_unknown_identifier() {
        let pp = setup(&SetupConfig::bulletproof(8).with_label("other"), &mut OsRng).unwrap();
        let raw = pp.serialize().unwrap();
        let err = DriverRegistry::default().public_parameters_from_bytes(&raw).unwrap_err();
        assert_eq!(err.root().to_string(), "driver [other] not found");
    }
}
