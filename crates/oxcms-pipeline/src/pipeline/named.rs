//! Named color lists
//!
//! A named color list maps an index to a color name, a 16-bit PCS value and
//! up to 16 device colorants. The named color stage turns a normalized
//! index into either of the two.

use std::fmt;
use std::sync::Arc;

use crate::context::{Context, ErrorSink};
use crate::error::{Error, ErrorCode, Result};
use crate::math::fixed::saturate_word;
use crate::pipeline::stages::{Stage, StageKind, StageSignature};

/// Maximum number of device colorants per named color
pub const MAX_COLORANTS: usize = 16;

/// Longest prefix or suffix kept, in characters
const MAX_AFFIX_CHARS: usize = 32;

/// Longest color name kept, in characters
const MAX_NAME_CHARS: usize = 255;

fn truncated(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// One entry of a named color list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedColor {
    pub name: String,
    /// Encoded PCS value
    pub pcs: [u16; 3],
    /// Device colorants; entries past the list's colorant count are zero
    pub device_colorant: [u16; MAX_COLORANTS],
}

/// An ordered list of named colors sharing a prefix, a suffix and a
/// colorant count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedColorList {
    prefix: String,
    suffix: String,
    colorant_count: usize,
    colors: Vec<NamedColor>,
}

impl NamedColorList {
    /// Create an empty list
    ///
    /// Prefix and suffix are cut to 32 characters.
    ///
    /// # Errors
    /// `Range` when `colorant_count` exceeds 16.
    pub fn new(ctx: &Context, colorant_count: usize, prefix: &str, suffix: &str) -> Result<Self> {
        if colorant_count > MAX_COLORANTS {
            return Err(ctx.signal(Error::range(format!(
                "Too many colorants ({} found, max is {})",
                colorant_count, MAX_COLORANTS
            ))));
        }

        Ok(Self {
            prefix: truncated(prefix, MAX_AFFIX_CHARS),
            suffix: truncated(suffix, MAX_AFFIX_CHARS),
            colorant_count,
            colors: Vec::new(),
        })
    }

    /// Append a color
    ///
    /// The name is cut to 255 characters. Only the first `colorant_count`
    /// colorants are kept; missing ones are zero.
    pub fn append(&mut self, name: &str, pcs: [u16; 3], colorants: &[u16]) {
        let mut device_colorant = [0u16; MAX_COLORANTS];
        for (dst, &v) in device_colorant
            .iter_mut()
            .zip(colorants)
            .take(self.colorant_count)
        {
            *dst = v;
        }

        self.colors.push(NamedColor {
            name: truncated(name, MAX_NAME_CHARS),
            pcs,
            device_colorant,
        });
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn colorant_count(&self) -> usize {
        self.colorant_count
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NamedColor> {
        self.colors.get(index)
    }

    pub fn colors(&self) -> &[NamedColor] {
        &self.colors
    }

    /// Index of a color by name, ignoring ASCII case
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.colors
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Named color stage payload
///
/// Holds the error sink of the construction context: an index outside the
/// list is reported there during evaluation.
#[derive(Clone)]
pub struct NamedColorStage {
    list: NamedColorList,
    use_pcs: bool,
    sink: Arc<dyn ErrorSink>,
}

impl fmt::Debug for NamedColorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedColorStage")
            .field("list", &self.list)
            .field("use_pcs", &self.use_pcs)
            .finish_non_exhaustive()
    }
}

impl NamedColorStage {
    pub fn list(&self) -> &NamedColorList {
        &self.list
    }

    /// Whether the stage outputs PCS values rather than colorants
    pub fn use_pcs(&self) -> bool {
        self.use_pcs
    }

    pub(crate) fn eval(&self, input: &[f32], output: &mut [f32]) {
        let index = saturate_word(input[0] as f64 * 65535.0) as usize;

        let Some(color) = self.list.get(index) else {
            self.sink.signal(
                ErrorCode::Range,
                &format!("Color {} out of range; max is {}", index, self.list.len()),
            );
            output.fill(0.0);
            return;
        };

        let values: &[u16] = if self.use_pcs {
            &color.pcs
        } else {
            &color.device_colorant[..self.list.colorant_count]
        };
        for (dst, &v) in output.iter_mut().zip(values) {
            *dst = v as f32 / 65535.0;
        }
    }
}

impl Stage {
    /// Index lookup into a named color list
    ///
    /// One input, the index scaled by 1/65535. Three PCS outputs when
    /// `use_pcs` is set, else one output per colorant.
    ///
    /// # Errors
    /// `Range` when the list has no colorants and `use_pcs` is not set.
    pub fn named_color(ctx: &Context, list: NamedColorList, use_pcs: bool) -> Result<Self> {
        let outputs = if use_pcs { 3 } else { list.colorant_count };
        let named = NamedColorStage {
            list,
            use_pcs,
            sink: ctx.error_sink().clone(),
        };

        Self::allocate(
            ctx,
            StageSignature::NAMED_COLOR,
            1,
            outputs,
            StageKind::NamedColor(named),
        )
    }

    /// The named color list, if this is a named color stage
    pub fn named_color_list(&self) -> Option<&NamedColorList> {
        match &self.kind {
            StageKind::NamedColor(named) => Some(named.list()),
            _ => None,
        }
    }
}
