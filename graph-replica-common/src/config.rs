// This file is part of graph-replica.
// Copyright (C) 2026 Graph Replica Contributors
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration loading shared by every binary in the workspace: a YAML base file overlaid with
//! `APP__`-prefixed, `__`-nested environment variables, following the same figment setup implied
//! by the teacher's `Config::load()` call sites.

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::de::DeserializeOwned;

const CONFIG_FILE_ENV_VAR: &str = "CONFIG_FILE";
const DEFAULT_CONFIG_FILE: &str = "config.yaml";
const ENV_PREFIX: &str = "APP__";
const ENV_NESTING_SEPARATOR: &str = "__";

/// Implemented by every binary's top-level `Config` struct to give it a uniform `load()` entry
/// point.
pub trait ConfigExt: DeserializeOwned {
    /// Loads configuration from `config.yaml` (or the file named by `CONFIG_FILE`), overridden by
    /// `APP__`-prefixed, double-underscore-nested environment variables, e.g.
    /// `APP__APPLICATION__NETWORK_ID`.
    fn load() -> Result<Self, figment::Error> {
        let config_file =
            std::env::var(CONFIG_FILE_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        Figment::new()
            .merge(Yaml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split(ENV_NESTING_SEPARATOR))
            .extract()
    }
}

impl<T> ConfigExt for T where T: DeserializeOwned {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::{env, io::Write};
    use tempfile::NamedTempFile;

    #[derive(Debug, Deserialize, PartialEq, Eq)]
    struct Inner {
        value: u32,
    }

    #[derive(Debug, Deserialize, PartialEq, Eq)]
    struct Outer {
        inner: Inner,
    }

    #[test]
    fn env_vars_override_yaml() {
        let mut file = NamedTempFile::new().expect("create temp config file");
        writeln!(file, "inner:\n  value: 1").expect("write yaml");

        // SAFETY: test-local env vars, no other thread in this test binary reads them.
        unsafe {
            env::set_var(CONFIG_FILE_ENV_VAR, file.path());
            env::set_var("APP__INNER__VALUE", "42");
        }

        let config = Outer::load().expect("load config");
        assert_eq!(config, Outer { inner: Inner { value: 42 } });

        unsafe {
            env::remove_var(CONFIG_FILE_ENV_VAR);
            env::remove_var("APP__INNER__VALUE");
        }
    }
}
