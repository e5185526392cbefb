//! Size limits, dimension defaulting and the private-delivery decision.

use std::time::Duration;

use emojicon_render::{ImageSourceKind, TargetHeight};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPolicy {
    pub max_width: u32,
    pub max_height: u32,
    pub default_width: u32,
    /// Default width for token-sourced images, which are already tightly
    /// cropped.
    pub token_default_width: u32,
    pub redirect_width_threshold: u32,
    pub redirect_height_threshold: u32,
    pub cooldown: Duration,
}

impl Default for RenderPolicy {
    fn default() -> Self {
        Self {
            max_width: 50,
            max_height: 200,
            default_width: 25,
            token_default_width: 18,
            redirect_width_threshold: 30,
            redirect_height_threshold: 50,
            cooldown: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("requested width exceeds {max}")]
    TooWide { max: u32 },
    #[error("requested height exceeds {max}")]
    TooTall { max: u32 },
    #[error("resized height {height} exceeds {max}")]
    TooTallAfterResize { height: u32, max: u32 },
}

impl ValidationError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::TooWide { .. } => "validation_too_wide",
            Self::TooTall { .. } => "validation_too_tall",
            Self::TooTallAfterResize { .. } => "validation_too_tall_after_resize",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDimensions {
    pub width: u32,
    pub height: TargetHeight,
}

impl RenderPolicy {
    /// Applies the size limits to the raw arguments, then fills defaults.
    ///
    /// Limits are checked before defaulting, so zero and negative values are
    /// never rejected; they fall back like missing ones.
    pub fn resolve_dimensions(
        &self,
        source_kind: ImageSourceKind,
        width: Option<i64>,
        height: Option<i64>,
    ) -> Result<ResolvedDimensions, ValidationError> {
        if width.is_some_and(|value| value > i64::from(self.max_width)) {
            return Err(ValidationError::TooWide {
                max: self.max_width,
            });
        }
        if height.is_some_and(|value| value > i64::from(self.max_height)) {
            return Err(ValidationError::TooTall {
                max: self.max_height,
            });
        }

        let width = match width {
            Some(value) if value >= 1 => value as u32,
            _ => match source_kind {
                ImageSourceKind::Token => self.token_default_width,
                ImageSourceKind::Attachment | ImageSourceKind::DirectUrl => self.default_width,
            },
        };
        let height = match height {
            Some(value) if value >= 1 => TargetHeight::Exact(value as u32),
            _ => TargetHeight::Auto,
        };
        Ok(ResolvedDimensions { width, height })
    }

    /// Aspect-preserving resizes can overshoot the nominal height limit.
    pub fn check_resized_height(&self, pixel_height: u32) -> Result<(), ValidationError> {
        if pixel_height > self.max_height {
            return Err(ValidationError::TooTallAfterResize {
                height: pixel_height,
                max: self.max_height,
            });
        }
        Ok(())
    }

    /// Whether output in a shared channel should move to private delivery.
    pub fn should_redirect(&self, requested_width: u32, pixel_height: u32) -> bool {
        requested_width > self.redirect_width_threshold
            || pixel_height > self.redirect_height_threshold
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown.as_millis().try_into().unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use emojicon_render::{ImageSourceKind, TargetHeight};

    use super::{RenderPolicy, ResolvedDimensions, ValidationError};

    #[test]
    fn unit_resolve_rejects_width_over_limit_before_defaulting() {
        let policy = RenderPolicy::default();
        assert_eq!(
            policy.resolve_dimensions(ImageSourceKind::DirectUrl, Some(51), None),
            Err(ValidationError::TooWide { max: 50 })
        );
        assert!(policy
            .resolve_dimensions(ImageSourceKind::DirectUrl, Some(50), None)
            .is_ok());
    }

    #[test]
    fn unit_resolve_rejects_height_over_limit() {
        let policy = RenderPolicy::default();
        assert_eq!(
            policy.resolve_dimensions(ImageSourceKind::Attachment, Some(10), Some(201)),
            Err(ValidationError::TooTall { max: 200 })
        );
    }

    #[test]
    fn functional_defaults_depend_on_source_kind() {
        let policy = RenderPolicy::default();
        assert_eq!(
            policy.resolve_dimensions(ImageSourceKind::Attachment, None, None),
            Ok(ResolvedDimensions {
                width: 25,
                height: TargetHeight::Auto,
            })
        );
        assert_eq!(
            policy.resolve_dimensions(ImageSourceKind::Token, None, Some(12)),
            Ok(ResolvedDimensions {
                width: 18,
                height: TargetHeight::Exact(12),
            })
        );
    }

    #[test]
    fn regression_non_positive_dimensions_fall_back_to_defaults() {
        let policy = RenderPolicy::default();
        assert_eq!(
            policy.resolve_dimensions(ImageSourceKind::DirectUrl, Some(0), Some(-4)),
            Ok(ResolvedDimensions {
                width: 25,
                height: TargetHeight::Auto,
            })
        );
    }

    #[test]
    fn unit_redirect_thresholds_are_strict() {
        let policy = RenderPolicy::default();
        assert!(!policy.should_redirect(30, 50));
        assert!(policy.should_redirect(31, 10));
        assert!(policy.should_redirect(10, 51));
    }

    #[test]
    fn unit_resized_height_check() {
        let policy = RenderPolicy::default();
        assert!(policy.check_resized_height(200).is_ok());
        assert_eq!(
            policy.check_resized_height(201),
            Err(ValidationError::TooTallAfterResize {
                height: 201,
                max: 200,
            })
        );
    }
}
