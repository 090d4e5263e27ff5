//! Property tests for version normalization.

use lumen_updater::VersionString;
use proptest::prelude::*;

fn raw_version() -> impl Strategy<Value = String> {
    (
        any::<bool>(),
        prop::collection::vec(0u32..100_000, 1..=5),
    )
        .prop_map(|(prefixed, parts)| {
            let body = parts
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(".");
            if prefixed { format!("v{body}") } else { body }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    /// Normalizing an already normalized version changes nothing.
    #[test]
    fn normalize_is_idempotent(raw in raw_version()) {
        let once = VersionString::normalize(&raw).expect("generated versions are valid");
        let twice = VersionString::normalize(&once.to_string()).expect("normalized form parses");
        prop_assert_eq!(once, twice);
        prop_assert_eq!(once.to_string(), twice.to_string());
    }

    /// The rendered form always has exactly three numeric components.
    #[test]
    fn normalized_form_has_three_components(raw in raw_version()) {
        let rendered = VersionString::normalize(&raw).expect("valid").to_string();
        let parts: Vec<&str> = rendered.split('.').collect();
        prop_assert_eq!(parts.len(), 3);
        prop_assert!(parts.iter().all(|p| p.parse::<u32>().is_ok()));
    }

    /// Anything containing a non-digit, non-dot character after the prefix is rejected.
    #[test]
    fn garbage_is_rejected(raw in "[0-9]{1,3}[a-uw-z+-][0-9]{0,3}") {
        prop_assert!(VersionString::normalize(&raw).is_err());
    }

    /// Long digit runs normalize exactly when every component fits in 32 bits,
    /// and overflowing ones are a version error rather than a panic.
    #[test]
    fn long_digit_runs_are_bounded(raw in "v?[0-9]{1,25}(\\.[0-9]{1,25}){0,2}") {
        let body = raw.strip_prefix('v').unwrap_or(&raw);
        let fits = body.split('.').all(|part| part.parse::<u32>().is_ok());
        match VersionString::normalize(&raw) {
            Ok(version) => {
                prop_assert!(fits);
                prop_assert_eq!(VersionString::normalize(&version.to_string()).unwrap(), version);
            }
            Err(err) => {
                prop_assert!(!fits);
                prop_assert!(matches!(err, lumen_updater::UpdateError::InvalidVersion(_)));
            }
        }
    }
}
