//! Process-wide packet bindings.
//!
//! Binding walks the host's type catalog, so it happens exactly once at
//! startup. Everything afterwards shares the same immutable synthesizer.

use crate::error::ResolveError;
use crate::host::Host;
use crate::packets::PacketSynthesizer;
use log::{error, info};
use std::sync::{Arc, OnceLock};

static SYNTHESIZER: OnceLock<Arc<PacketSynthesizer>> = OnceLock::new();

/// Binds against `host` and publishes the result.
///
/// Fails with the first resolution error, or with
/// [`ResolveError::AlreadyInitialized`] when called a second time.
pub fn init(host: &dyn Host) -> Result<Arc<PacketSynthesizer>, ResolveError> {
    if SYNTHESIZER.get().is_some() {
        return Err(ResolveError::AlreadyInitialized);
    }

    let synthesizer = PacketSynthesizer::bind(host).map_err(|e| {
        error!("Failed to bind packet handles: {}", e);
        e
    })?;
    let synthesizer = Arc::new(synthesizer);

    // Two racing callers can both bind; only one gets published
    SYNTHESIZER
        .set(Arc::clone(&synthesizer))
        .map_err(|_| ResolveError::AlreadyInitialized)?;
    info!("Packet registry initialized for {}", host.implementation_package());
    Ok(synthesizer)
}

/// The published synthesizer, if [`init`] succeeded.
pub fn get() -> Option<Arc<PacketSynthesizer>> {
    SYNTHESIZER.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Revision, SimulatedHost};

    // The registry is global to the test binary, so everything lives in one test
    #[test]
    fn test_init_once() {
        let mut broken = SimulatedHost::new(Revision::V1_8R3);
        broken.remove_type("net.minecraft.server.v1_8_R3.PacketPlayOutPlayerInfo");
        assert!(matches!(init(&broken), Err(ResolveError::TypeNotFound(_))));
        assert!(get().is_none());

        let host = SimulatedHost::new(Revision::V1_8R3);
        let bound = init(&host).unwrap();
        let shared = get().unwrap();
        assert!(Arc::ptr_eq(&bound, &shared));

        assert_eq!(init(&host).unwrap_err(), ResolveError::AlreadyInitialized);
    }
}
