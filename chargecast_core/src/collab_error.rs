//! Maps `Box<dyn Error>` from collaborator boundaries to typed `ChargeError`.
//!
//! `BatteryMonitor` and `SeriesWriter` return boxed errors so that device and
//! store crates stay independent of this one; the engine converts them here.

use crate::error::ChargeError;

/// Which boundary an error crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    Observer,
    Store,
}

/// Map a collaborator error to a typed `ChargeError`.
///
/// Walks the source chain so that the innermost cause is kept in the message.
pub fn map_collab_error(from: Collaborator, e: &(dyn std::error::Error + 'static)) -> ChargeError {
    let mut msg = e.to_string();
    let mut src = e.source();
    while let Some(inner) = src {
        let s = inner.to_string();
        if !msg.contains(&s) {
            msg = format!("{msg}: {s}");
        }
        src = inner.source();
    }
    match from {
        Collaborator::Observer => ChargeError::Observer(msg),
        Collaborator::Store => ChargeError::Persist(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn source_chain_is_flattened() {
        let e = Outer(std::io::Error::other("disk gone"));
        match map_collab_error(Collaborator::Store, &e) {
            ChargeError::Persist(m) => assert_eq!(m, "outer: disk gone"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
