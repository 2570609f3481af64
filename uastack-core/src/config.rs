// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Config trait for client and server configurations loaded from yaml.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use log::error;
use serde::{de::DeserializeOwned, Serialize};

use uastack_types::{ApplicationDescription, ApplicationType, LocalizedText, UAString};

/// A trait that handles the loading / saving and validity of configuration
/// information for a client and/or server.
pub trait Config: Serialize + Sized {
    /// Save the config to a yaml file.
    fn save(&self, path: &Path) -> Result<(), String> {
        let errors = self.errors();
        if !errors.is_empty() {
            return Err(format!("Errors in configuration: {}", errors.join(", ")));
        }
        let s = serde_yaml::to_string(&self).map_err(|e| e.to_string())?;
        let mut f = File::create(path).map_err(|e| e.to_string())?;
        f.write_all(s.as_bytes()).map_err(|e| e.to_string())
    }

    /// Load the config from a yaml file.
    fn load<A>(path: &Path) -> Result<A, String>
    where
        A: Config + DeserializeOwned,
    {
        let mut f = File::open(path).map_err(|e| e.to_string())?;
        let mut s = String::new();
        f.read_to_string(&mut s).map_err(|e| e.to_string())?;
        serde_yaml::from_str(&s).map_err(|e| e.to_string())
    }

    /// A list of problems with the configuration, empty when it is usable.
    fn errors(&self) -> Vec<String>;

    /// Test if the config is valid, logging any errors.
    fn is_valid(&self) -> bool {
        let errors = self.errors();
        for e in &errors {
            error!("Configuration error: {e}");
        }
        errors.is_empty()
    }

    /// The application name of the configured application.
    fn application_name(&self) -> UAString;

    /// The application uri of the configured application.
    fn application_uri(&self) -> UAString;

    /// The product uri of the configured application.
    fn product_uri(&self) -> UAString;

    /// The application type, client or server.
    fn application_type(&self) -> ApplicationType;

    /// The urls the application can be discovered on.
    fn discovery_urls(&self) -> Option<Vec<UAString>>;

    /// An application description built from the config.
    fn application_description(&self) -> ApplicationDescription {
        ApplicationDescription {
            application_uri: self.application_uri(),
            product_uri: self.product_uri(),
            application_name: LocalizedText {
                locale: UAString::null(),
                text: self.application_name(),
            },
            application_type: self.application_type(),
            gateway_server_uri: UAString::null(),
            discovery_profile_uri: UAString::null(),
            discovery_urls: self.discovery_urls(),
        }
    }
}
