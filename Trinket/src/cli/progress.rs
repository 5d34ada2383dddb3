//! CLI progress display utilities
//!
//! Step indicators with emojis, a spinner for single exports and a bar for
//! batch exports.

use std::time::Duration;

use console::{Emoji, style};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

use crate::export::ExportPhase;

// =============================================================================
// Emoji Constants (with ASCII fallbacks for terminals without emoji support)
// =============================================================================

/// Magnifying glass - for scanning the archive
pub static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
/// Package - for dependency extraction
pub static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "");
/// Floppy disk - for writing documents
pub static DISK: Emoji<'_, '_> = Emoji("💾 ", "");
/// Gear - for decoding
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
/// Sparkles - for completion
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");
/// Truck - for batch exports
pub static TRUCK: Emoji<'_, '_> = Emoji("🚚 ", "");
/// Picture - for texture conversion
pub static PICTURE: Emoji<'_, '_> = Emoji("🖼️  ", "");
/// Film - for animation export
pub static FILM: Emoji<'_, '_> = Emoji("🎞️  ", "");
/// Cube - for 3D model operations
pub static CUBE: Emoji<'_, '_> = Emoji("📐 ", "");

/// Emoji shown for an export phase.
#[must_use]
pub fn phase_emoji(phase: ExportPhase) -> Emoji<'static, 'static> {
    match phase {
        ExportPhase::ResolvingDependencies => PACKAGE,
        ExportPhase::DecodingModel => GEAR,
        ExportPhase::WritingModel => DISK,
        ExportPhase::ConvertingTextures => PICTURE,
        ExportPhase::ExportingAnimations => FILM,
        ExportPhase::ModelFinished => CUBE,
        ExportPhase::Complete => SPARKLE,
    }
}

// =============================================================================
// Step-Based Progress
// =============================================================================

/// Print a step indicator: `[1/3] 📦 Message...`
pub fn print_step(current: usize, total: usize, emoji: Emoji, msg: &str) {
    println!(
        "{} {}{}",
        style(format!("[{current}/{total}]")).bold().dim(),
        emoji,
        msg
    );
}

/// Print completion message: `✨ Done in 2s`
pub fn print_done(elapsed: Duration) {
    println!("{} Done in {}", SPARKLE, HumanDuration(elapsed));
}

// =============================================================================
// Progress Styles
// =============================================================================

/// Progress bar style for batch exports
///
/// Format: `Exporting [████████░░░░░░░░] 50/100`
///
/// # Panics
/// Panics if the template string is invalid (this is a compile-time constant).
#[must_use]
pub fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
        .expect("valid template")
}

/// Create a spinner for an export of unknown length
///
/// # Panics
/// Panics if the template string is invalid (this is a compile-time constant).
#[must_use]
pub fn simple_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .expect("valid template"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a progress bar over `total` items
#[must_use]
pub fn simple_bar(total: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(bar_style());
    pb.set_message(msg.to_string());
    pb
}
