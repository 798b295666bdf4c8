use std::path::PathBuf;
use std::sync::Once;

static INIT: Once = Once::new();

/// Points the config loaders at the fixture files shipped with this crate.
pub fn ensure_test_config() {
    INIT.call_once(|| {
        let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures");
        let generation_path = fixtures.join("test_event_generation.json");

        debug_assert!(
            generation_path.exists(),
            "missing test event generation config at {}",
            generation_path.display()
        );

        std::env::set_var("META_EVENT_GENERATION_PATH", &generation_path);
        std::env::set_var("META_SIM_SEED", "1234");
    });
}
