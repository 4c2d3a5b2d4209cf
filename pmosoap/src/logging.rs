//! Initialisation des traces.
//!
//! `RUST_LOG` a priorité sur le niveau passé en paramètre (en général
//! `logging.level` de la configuration).

use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Installe le subscriber global.
///
/// Retourne `false` si un subscriber était déjà installé (par l'hôte ou par
/// un appel précédent) ; il est alors conservé.
pub fn init_logging(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    Registry::default()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .try_init()
        .is_ok()
}

/// [`init_logging`] avec le niveau configuré
pub fn init_from_config(config: &LoggingConfig) -> bool {
    init_logging(&config.level)
}
