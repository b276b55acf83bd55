pub mod prepare;
pub mod run;
pub mod score;

use epistemic_bench::IndicatorSet;

pub fn list_indicators() {
    println!("Available indicators:\n");
    for selector in IndicatorSet::registered_indicators() {
        if let Some(indicator) = IndicatorSet::from(selector) {
            println!("  {} - {}", selector, indicator.description());
            println!("    dataset files: {}", indicator.dataset_files().join(", "));
            println!();
        }
    }
}
