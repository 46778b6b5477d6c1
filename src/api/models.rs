//! Known model registry.
//!
//! A static table consumed by `--list-models` and by the `/model` command's
//! sanity warning. Unknown names are still sent to the API as-is, so new
//! models work without a release.

/// Information about a known model.
pub struct ModelInfo {
    /// The model identifier string (e.g., "claude-sonnet-4-5").
    pub name: &'static str,
    /// Context window size in tokens.
    pub context_window: usize,
}

/// Known models, newest first.
pub const KNOWN_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "claude-opus-4-1",
        context_window: 200_000,
    },
    ModelInfo {
        name: "claude-sonnet-4-5",
        context_window: 200_000,
    },
    ModelInfo {
        name: "claude-sonnet-4-0",
        context_window: 200_000,
    },
    ModelInfo {
        name: "claude-3-7-sonnet-latest",
        context_window: 200_000,
    },
    ModelInfo {
        name: "claude-3-5-haiku-latest",
        context_window: 200_000,
    },
];

/// Whether a model name appears in the known table.
pub fn is_known(name: &str) -> bool {
    KNOWN_MODELS.iter().any(|m| m.name == name)
}

/// Print the model table, marking the currently selected model.
pub fn print_models(current: &str) {
    println!("Available models:\n");
    for info in KNOWN_MODELS {
        let marker = if info.name == current { " (current)" } else { "" };
        println!(
            "  {} ({}k context){marker}",
            info.name,
            info.context_window / 1000
        );
    }
}
