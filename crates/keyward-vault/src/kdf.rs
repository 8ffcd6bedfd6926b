// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Versioned key derivation.
//!
//! [`KdfRegistry`] maps a persisted version tag to an algorithm. Every stored
//! envelope carries its [`KdfParams`], so users created under an older
//! version keep deriving with it while new envelopes get the current one.
//! Adding an algorithm is one more entry in the table built by
//! [`KdfRegistry::init`].
//!
//! | version | algorithm | default cost |
//! |---|---|---|
//! | 1 | PBKDF2-HMAC-SHA256 | 100 000 iterations |
//! | 2 | scrypt | N = 2^16, r = 8, p = 1 (64 MiB) |
//! | 3 | Argon2id | 64 MiB, t = 3, p = 4 |
//!
//! Memory-hard derivations run on the blocking pool, bounded by a semaphore
//! the registry owns. [`KdfRegistry::shutdown`] closes it.

use std::collections::BTreeMap;
use std::sync::Arc;

use keyward_config::KdfConfig;
use keyward_core::KeywardError;
use keyward_core::types::{KEY_LEN, KdfCost, KdfParams, SALT_LEN};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Semaphore;
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::{Kek, random_bytes};

/// One KDF algorithm bound to a version tag.
pub trait KdfAlgorithm: Send + Sync {
    /// Human-readable algorithm name for logs.
    fn name(&self) -> &'static str;

    /// Cost parameters assigned to new envelopes.
    fn default_cost(&self) -> KdfCost;

    /// Derive a 32-byte key. Costs of another algorithm family are rejected.
    fn derive(
        &self,
        password: &[u8],
        salt: &[u8; SALT_LEN],
        cost: &KdfCost,
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, KeywardError>;
}

fn mismatched(name: &str, cost: &KdfCost) -> KeywardError {
    KeywardError::Kdf(format!("{name} cannot use parameters {cost:?}"))
}

/// Legacy iterative hash KDF.
pub struct Pbkdf2Sha256 {
    pub iterations: u32,
}

impl KdfAlgorithm for Pbkdf2Sha256 {
    fn name(&self) -> &'static str {
        "pbkdf2-sha256"
    }

    fn default_cost(&self) -> KdfCost {
        KdfCost::Pbkdf2Sha256 {
            iterations: self.iterations,
        }
    }

    fn derive(
        &self,
        password: &[u8],
        salt: &[u8; SALT_LEN],
        cost: &KdfCost,
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, KeywardError> {
        let KdfCost::Pbkdf2Sha256 { iterations } = *cost else {
            return Err(mismatched(self.name(), cost));
        };
        if iterations == 0 {
            return Err(KeywardError::Kdf("PBKDF2 iteration count is zero".to_string()));
        }
        let mut output = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, salt, iterations, output.as_mut());
        Ok(output)
    }
}

/// Memory-hard scrypt KDF.
pub struct Scrypt {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl KdfAlgorithm for Scrypt {
    fn name(&self) -> &'static str {
        "scrypt"
    }

    fn default_cost(&self) -> KdfCost {
        KdfCost::Scrypt {
            log_n: self.log_n,
            r: self.r,
            p: self.p,
        }
    }

    fn derive(
        &self,
        password: &[u8],
        salt: &[u8; SALT_LEN],
        cost: &KdfCost,
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, KeywardError> {
        let KdfCost::Scrypt { log_n, r, p } = *cost else {
            return Err(mismatched(self.name(), cost));
        };
        let params = scrypt::Params::new(log_n, r, p, KEY_LEN)
            .map_err(|e| KeywardError::Kdf(format!("invalid scrypt parameters: {e}")))?;
        let mut output = Zeroizing::new([0u8; KEY_LEN]);
        scrypt::scrypt(password, salt, &params, output.as_mut())
            .map_err(|e| KeywardError::Kdf(format!("scrypt derivation failed: {e}")))?;
        Ok(output)
    }
}

/// Memory-hard Argon2id KDF.
pub struct Argon2id {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl KdfAlgorithm for Argon2id {
    fn name(&self) -> &'static str {
        "argon2id"
    }

    fn default_cost(&self) -> KdfCost {
        KdfCost::Argon2id {
            memory_kib: self.memory_kib,
            iterations: self.iterations,
            parallelism: self.parallelism,
        }
    }

    fn derive(
        &self,
        password: &[u8],
        salt: &[u8; SALT_LEN],
        cost: &KdfCost,
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, KeywardError> {
        let KdfCost::Argon2id {
            memory_kib,
            iterations,
            parallelism,
        } = *cost
        else {
            return Err(mismatched(self.name(), cost));
        };
        let params = argon2::Params::new(memory_kib, iterations, parallelism, Some(KEY_LEN))
            .map_err(|e| KeywardError::Kdf(format!("invalid Argon2id parameters: {e}")))?;
        let argon2 =
            argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let mut output = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(password, salt, output.as_mut())
            .map_err(|e| KeywardError::Kdf(format!("Argon2id derivation failed: {e}")))?;
        Ok(output)
    }
}

struct Inner {
    table: BTreeMap<u32, Arc<dyn KdfAlgorithm>>,
    current_version: u32,
    permits: Arc<Semaphore>,
}

/// Strategy table of KDF algorithms keyed by version, with an explicit
/// init/shutdown lifecycle. Cloning shares the same table and permits.
#[derive(Clone)]
pub struct KdfRegistry {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for KdfRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KdfRegistry")
            .field("versions", &self.inner.table.keys().collect::<Vec<_>>())
            .field("current_version", &self.inner.current_version)
            .field("closed", &self.inner.permits.is_closed())
            .finish()
    }
}

impl KdfRegistry {
    /// Build the version table from configuration.
    pub fn init(config: &KdfConfig) -> Result<Self, KeywardError> {
        let mut table: BTreeMap<u32, Arc<dyn KdfAlgorithm>> = BTreeMap::new();
        table.insert(
            1,
            Arc::new(Pbkdf2Sha256 {
                iterations: config.pbkdf2_iterations,
            }),
        );
        table.insert(
            2,
            Arc::new(Scrypt {
                log_n: config.scrypt_log_n,
                r: config.scrypt_r,
                p: config.scrypt_p,
            }),
        );
        table.insert(
            3,
            Arc::new(Argon2id {
                memory_kib: config.argon2_memory_kib,
                iterations: config.argon2_iterations,
                parallelism: config.argon2_parallelism,
            }),
        );

        if !table.contains_key(&config.current_version) {
            return Err(KeywardError::UnsupportedKdfVersion(config.current_version));
        }
        if config.max_concurrent_derivations == 0 {
            return Err(KeywardError::Config(
                "kdf.max_concurrent_derivations must be at least 1".to_string(),
            ));
        }

        debug!(
            current_version = config.current_version,
            permits = config.max_concurrent_derivations,
            "KDF registry initialized"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                table,
                current_version: config.current_version,
                permits: Arc::new(Semaphore::new(config.max_concurrent_derivations)),
            }),
        })
    }

    /// Close the derivation permits. Derivations already running finish;
    /// new ones fail.
    pub fn shutdown(&self) {
        self.inner.permits.close();
        debug!("KDF registry shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.permits.is_closed()
    }

    /// Version assigned to new envelopes.
    pub fn current_version(&self) -> u32 {
        self.inner.current_version
    }

    fn algorithm(&self, version: u32) -> Result<&Arc<dyn KdfAlgorithm>, KeywardError> {
        self.inner
            .table
            .get(&version)
            .ok_or(KeywardError::UnsupportedKdfVersion(version))
    }

    /// Parameters a new envelope gets under `version`.
    pub fn generate_params(&self, version: u32) -> Result<KdfParams, KeywardError> {
        Ok(KdfParams {
            version,
            cost: self.algorithm(version)?.default_cost(),
        })
    }

    /// Parameters for the current version.
    pub fn current_params(&self) -> Result<KdfParams, KeywardError> {
        self.generate_params(self.inner.current_version)
    }

    /// A fresh random 16-byte salt.
    pub fn generate_salt() -> Result<[u8; SALT_LEN], KeywardError> {
        random_bytes()
    }

    /// Derive a KEK on the calling thread.
    ///
    /// Deterministic: identical inputs give a byte-identical KEK.
    pub fn derive_kek_blocking(
        &self,
        password: &[u8],
        salt: &[u8],
        params: &KdfParams,
    ) -> Result<Kek, KeywardError> {
        let salt: &[u8; SALT_LEN] = salt.try_into().map_err(|_| KeywardError::InvalidSaltLength {
            expected: SALT_LEN,
            actual: salt.len(),
        })?;
        let algorithm = self.algorithm(params.version)?;
        let output = algorithm.derive(password, salt, &params.cost)?;
        Ok(Kek::new(output))
    }

    /// Derive a KEK on the blocking pool, holding one derivation permit.
    ///
    /// Cheap checks (salt length, version) run before a permit is taken.
    pub async fn derive_kek(
        &self,
        password: &SecretString,
        salt: &[u8],
        params: &KdfParams,
    ) -> Result<Kek, KeywardError> {
        if salt.len() != SALT_LEN {
            return Err(KeywardError::InvalidSaltLength {
                expected: SALT_LEN,
                actual: salt.len(),
            });
        }
        let name = self.algorithm(params.version)?.name();

        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| KeywardError::Kdf("registry shut down".to_string()))?;

        let registry = self.clone();
        let password = Zeroizing::new(password.expose_secret().as_bytes().to_vec());
        let salt = salt.to_vec();
        let params = *params;
        let started = std::time::Instant::now();
        let kek = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            registry.derive_kek_blocking(&password, &salt, &params)
        })
        .await
        .map_err(|e| KeywardError::Internal(format!("KDF task failed: {e}")))??;

        debug!(
            version = params.version,
            algorithm = name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "KEK derived"
        );
        Ok(kek)
    }
}
