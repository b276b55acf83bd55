use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::indicators::Indicator;

type IndicatorConstructor = fn() -> Box<dyn Indicator>;
type Registry = &'static RwLock<HashMap<&'static str, IndicatorConstructor>>;

static INDICATOR_REGISTRY: OnceLock<RwLock<HashMap<&'static str, IndicatorConstructor>>> =
    OnceLock::new();

fn indicator_registry() -> Registry {
    INDICATOR_REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register an indicator under its selector.
pub fn register_indicator(selector: &'static str, constructor: IndicatorConstructor) {
    let registry = indicator_registry();
    if let Ok(mut map) = registry.write() {
        map.insert(selector, constructor);
    }
}

pub struct IndicatorSet;

impl IndicatorSet {
    pub fn from(selector: &str) -> Option<Box<dyn Indicator>> {
        let registry = indicator_registry();
        let map = registry
            .read()
            .expect("Failed to read the indicator registry.");

        let constructor = map.get(selector)?;
        Some(constructor())
    }

    pub fn registered_indicators() -> Vec<&'static str> {
        let registry = indicator_registry();
        let map = registry
            .read()
            .expect("Failed to read the indicator registry.");

        let mut selectors: Vec<_> = map.keys().copied().collect();
        selectors.sort();
        selectors
    }
}

#[macro_export]
macro_rules! register_indicator {
    ($selector:literal, $indicator_type:ty) => {
        paste::paste! {
            #[ctor::ctor]
            #[allow(non_snake_case)]
            fn [<__register_indicator_ $indicator_type>]() {
                $crate::registry::register_indicator($selector, || {
                    Box::new(<$indicator_type>::new())
                });
            }
        }
    };
}
