use std::fmt;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use plotters::style::RGBColor;

use crate::config::Config;
use crate::mapper::DEFAULT_LINE_POS;

/// Where the colour ramp leaves white; anything above zero lands past it.
const RAMP_START: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const WHITE: Self = Self::new(0xff, 0xff, 0xff);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear blend, `t` clamped to 0..=1.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| -> u8 {
            (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8
        };
        Self::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
        )
    }
}

impl FromStr for HexColor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| anyhow!("expected #rgb or #rrggbb, got: {s}"))?;

        let digits: Vec<u8> = hex
            .chars()
            .map(|ch| {
                ch.to_digit(16)
                    .map(|d| d as u8)
                    .ok_or_else(|| anyhow!("invalid hex digit '{ch}' in colour {s}"))
            })
            .collect::<anyhow::Result<_>>()?;

        match digits.as_slice() {
            [r, g, b] => Ok(Self::new(r * 17, g * 17, b * 17)),
            [r1, r0, g1, g0, b1, b0] => Ok(Self::new(r1 * 16 + r0, g1 * 16 + g0, b1 * 16 + b0)),
            _ => Err(anyhow!("expected #rgb or #rrggbb, got: {s}")),
        }
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl From<HexColor> for RGBColor {
    fn from(color: HexColor) -> Self {
        RGBColor(color.r, color.g, color.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStyle {
    pub color: HexColor,
    pub line_pos: f64,
    pub width: f64,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: HexColor::new(0x9e, 0x9e, 0x9e),
            line_pos: DEFAULT_LINE_POS,
            width: 1.5,
        }
    }
}

/// Colour ramp of the count layer. Zero stays white.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyStyle {
    pub min_color: HexColor,
    pub max_color: HexColor,
}

impl Default for FrequencyStyle {
    fn default() -> Self {
        Self {
            min_color: HexColor::new(0xee, 0xee, 0xee),
            max_color: HexColor::new(0x67, 0x8f, 0xae),
        }
    }
}

impl FrequencyStyle {
    /// Stops in the `[position, colour]` form charting libraries expect.
    pub fn colorscale(&self) -> Vec<(f64, HexColor)> {
        vec![
            (0.0, HexColor::WHITE),
            (0.0, HexColor::WHITE),
            (RAMP_START, self.min_color),
            (1.0, self.max_color),
        ]
    }

    /// Colour of a cell with count `z` on a layer spanning `zmin..=zmax`.
    pub fn color_for(&self, z: u64, zmin: u64, zmax: u64) -> HexColor {
        if zmax <= zmin || z <= zmin {
            return HexColor::WHITE;
        }
        let t = (z - zmin) as f64 / (zmax - zmin) as f64;
        if t <= RAMP_START {
            return self.min_color;
        }
        self.min_color
            .lerp(self.max_color, (t - RAMP_START) / (1.0 - RAMP_START))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventStyle {
    pub color: HexColor,
}

impl Default for EventStyle {
    fn default() -> Self {
        Self {
            color: HexColor::new(0x76, 0xcf, 0x63),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapStyle {
    pub line: LineStyle,
    pub frequency: FrequencyStyle,
    pub event: EventStyle,
    pub height: u32,
    /// Label shown next to the count on hover; the value column name if unset.
    pub value_label: Option<String>,
}

impl Default for HeatmapStyle {
    fn default() -> Self {
        Self {
            line: LineStyle::default(),
            frequency: FrequencyStyle::default(),
            event: EventStyle::default(),
            height: 250,
            value_label: None,
        }
    }
}

impl HeatmapStyle {
    #[tracing::instrument(skip(cfg))]
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let line = LineStyle {
            color: color_key(cfg, "line.color")?.unwrap_or(defaults.line.color),
            line_pos: cfg.get_f64("line.pos")?.unwrap_or(defaults.line.line_pos),
            width: cfg.get_f64("line.width")?.unwrap_or(defaults.line.width),
        };
        if !(0.0..=1.0).contains(&line.line_pos) {
            return Err(anyhow!(
                "line.pos must be between 0 and 1, got {}",
                line.line_pos
            ));
        }

        let frequency = FrequencyStyle {
            min_color: color_key(cfg, "freq.min_color")?.unwrap_or(defaults.frequency.min_color),
            max_color: color_key(cfg, "freq.max_color")?.unwrap_or(defaults.frequency.max_color),
        };

        let event = EventStyle {
            color: color_key(cfg, "event.color")?.unwrap_or(defaults.event.color),
        };

        Ok(Self {
            line,
            frequency,
            event,
            height: cfg.get_u32("layout.height")?.unwrap_or(defaults.height),
            value_label: cfg.get("value.label"),
        })
    }
}

fn color_key(cfg: &Config, key: &str) -> anyhow::Result<Option<HexColor>> {
    cfg.get(key)
        .map(|raw| {
            raw.parse::<HexColor>()
                .with_context(|| format!("invalid colour for {key}"))
        })
        .transpose()
}
