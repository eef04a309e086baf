//! Conversion profiles.
//!
//! A profile is a named target-dimension/padding/encoding policy expressed
//! as data. The padding constant and fit policy have been revised more than
//! once historically, so both are parameters rather than hardcoded values.

/// How a source image is mapped into its computed target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitPolicy {
    /// Both dimensions forced to the target box (the aspect ratio is already
    /// baked into the box computation).
    Exact,
    /// Aspect-locked shrink to fit inside the box.
    Inside,
    /// Aspect-locked fill, cropping overflow.
    Cover,
}

/// Shape of the computed target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetShape {
    /// Fixed square box regardless of source aspect (Icon).
    Square,
    /// Aspect-derived box bounded so the padded axis never exceeds the
    /// target edge (Sticker).
    AspectBox,
}

/// A named conversion policy.
#[derive(Debug, Clone)]
pub struct ConversionProfile {
    /// Profile name, used for staged-asset purposes and logging.
    pub name: &'static str,
    /// Target box edge in pixels.
    pub target: u32,
    /// Transparent strip height appended after resize (one edge only).
    pub padding_px: u32,
    /// Box shape policy.
    pub shape: TargetShape,
    /// Resize mapping policy.
    pub fit: FitPolicy,
    /// Resize even when the source already fits the box.
    pub force_resize: bool,
}

impl ConversionProfile {
    /// Icon profile: exact 100×100, no padding, always resized.
    pub fn icon() -> Self {
        Self {
            name: "icon",
            target: 100,
            padding_px: 0,
            shape: TargetShape::Square,
            fit: FitPolicy::Exact,
            force_resize: true,
        }
    }

    /// Sticker profile: longest side 512, bounded so height plus the 50 px
    /// transparent strip never exceeds 512; resized only when needed.
    pub fn sticker() -> Self {
        Self {
            name: "sticker",
            target: 512,
            padding_px: 50,
            shape: TargetShape::AspectBox,
            fit: FitPolicy::Exact,
            force_resize: false,
        }
    }

    /// Override the padding strip height.
    pub fn with_padding(mut self, px: u32) -> Self {
        self.padding_px = px;
        self
    }

    /// Force resizing even for sources that already fit.
    pub fn forced(mut self) -> Self {
        self.force_resize = true;
        self
    }

    /// Height budget left for image content on the padded axis.
    pub fn content_budget(&self) -> u32 {
        self.target.saturating_sub(self.padding_px)
    }

    /// Whether a source of the given dimensions already fits without resize.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        match self.shape {
            TargetShape::Square => width == self.target && height == self.target,
            TargetShape::AspectBox => width <= self.target && height <= self.content_budget(),
        }
    }

    /// Compute the pre-padding target box for a source of the given size.
    ///
    /// For [`TargetShape::AspectBox`]: width-major sources get width pinned
    /// to the target edge; height-major sources get height pinned to the
    /// content budget. If the width-major branch still overflows the budget
    /// (near-square sources), height is clamped to the budget and width
    /// recomputed from the ratio, so the padded total never exceeds the
    /// target edge.
    pub fn target_box(&self, width: u32, height: u32) -> (u32, u32) {
        match self.shape {
            TargetShape::Square => (self.target, self.target),
            TargetShape::AspectBox => {
                if !self.force_resize && self.fits(width, height) {
                    return (width, height);
                }

                let ratio = f64::from(width) / f64::from(height);
                let budget = self.content_budget();

                let (mut tw, mut th) = if width >= height {
                    (self.target, (f64::from(self.target) / ratio).round() as u32)
                } else {
                    ((f64::from(budget) * ratio).round() as u32, budget)
                };

                if th > budget {
                    th = budget;
                    tw = (f64::from(budget) * ratio).round() as u32;
                }

                (tw.clamp(1, self.target), th.max(1))
            }
        }
    }
}
