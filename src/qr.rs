// Scannable-code rendering over the gateway's opaque payment payload.
// Rendering is synchronous: QR encoding of a payment-link payload is cheap
// enough that an async seam would buy nothing.

use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCorrection {
    Low,
    Medium,
    Quartile,
    High,
}

impl From<ErrorCorrection> for EcLevel {
    fn from(ec: ErrorCorrection) -> Self {
        match ec {
            ErrorCorrection::Low => EcLevel::L,
            ErrorCorrection::Medium => EcLevel::M,
            ErrorCorrection::Quartile => EcLevel::Q,
            ErrorCorrection::High => EcLevel::H,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Minimum rendered size in pixels (square).
    pub min_dimensions: u32,
    pub quiet_zone: bool,
    pub error_correction: ErrorCorrection,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            min_dimensions: 240,
            quiet_zone: true,
            error_correction: ErrorCorrection::Medium,
        }
    }
}

/// A rendered scannable code, cheap to clone into session snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannableCode {
    pub svg: String,
    /// Modules per side of the underlying QR symbol.
    pub modules: u32,
}

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Turns an opaque payment payload into a displayable scannable image.
/// Failures are surfaced to the caller and never retried: re-encoding the
/// same payload cannot change the outcome.
pub trait CodeRenderer: Send + Sync {
    fn render(&self, raw_payload: &str, options: &RenderOptions)
        -> Result<ScannableCode, RenderError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QrSvgRenderer;

impl CodeRenderer for QrSvgRenderer {
    fn render(
        &self,
        raw_payload: &str,
        options: &RenderOptions,
    ) -> Result<ScannableCode, RenderError> {
        if raw_payload.is_empty() {
            return Err(RenderError::Malformed("empty payload".to_string()));
        }
        let code =
            QrCode::with_error_correction_level(raw_payload, options.error_correction.into())
                .map_err(|e| RenderError::Malformed(e.to_string()))?;
        let svg = code
            .render::<svg::Color>()
            .min_dimensions(options.min_dimensions, options.min_dimensions)
            .quiet_zone(options.quiet_zone)
            .build();
        Ok(ScannableCode {
            svg,
            modules: code.width() as u32,
        })
    }
}
