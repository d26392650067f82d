use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One LED's color as normalized intensities in `[0.0, 1.0]`.
///
/// The white channel is carried along for status reporting but LPD8806
/// chips only have three channels, so it is never encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct Pixel {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub white: f32,
}

impl Pixel {
    pub const OFF: Pixel = Pixel::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(red: f32, green: f32, blue: f32, white: f32) -> Self {
        Pixel { red, green, blue, white }
    }

    /// Build a pixel from 8-bit RGB as carried by OPC messages
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Pixel::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            0.0,
        )
    }

    fn channel(&self, channel: Channel) -> f32 {
        match channel {
            Channel::Red => self.red,
            Channel::Green => self.green,
            Channel::Blue => self.blue,
        }
    }
}

impl From<[f32; 4]> for Pixel {
    fn from([red, green, blue, white]: [f32; 4]) -> Self {
        Pixel { red, green, blue, white }
    }
}

impl From<Pixel> for [f32; 4] {
    fn from(p: Pixel) -> Self {
        [p.red, p.green, p.blue, p.white]
    }
}

/// Convert packed RGB bytes into pixels, overlaying them onto `current`.
///
/// LEDs past the end of `data` keep their current color; extra bytes are ignored.
pub fn overlay_rgb8(current: &[Pixel], data: &[u8]) -> Vec<Pixel> {
    let mut pixels = current.to_vec();
    for (pixel, rgb) in pixels.iter_mut().zip(data.chunks_exact(3)) {
        let white = pixel.white;
        *pixel = Pixel::from_rgb8(rgb[0], rgb[1], rgb[2]);
        pixel.white = white;
    }
    pixels
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

/// Wire order of the three color bytes for each LED
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum ColorOrder {
    #[default]
    RGB,
    RBG,
    GRB,
    GBR,
    BRG,
    BGR,
}

/// Which byte permutation table a [`ColorOrder`] resolves through.
///
/// `Legacy` reproduces the permutations deployed strips were configured
/// against: RGB goes out as G,R,B and GRB goes out as G,B,R (identical to GBR).
/// `Named` emits every order in the order its name spells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMapping {
    #[default]
    Legacy,
    Named,
}

use Channel::{Blue as B, Green as G, Red as R};

const LEGACY: [[Channel; 3]; 6] = [
    [G, R, B], // RGB
    [R, B, G], // RBG
    [G, B, R], // GRB, same as GBR
    [G, B, R], // GBR
    [B, R, G], // BRG
    [B, G, R], // BGR
];

const NAMED: [[Channel; 3]; 6] = [
    [R, G, B],
    [R, B, G],
    [G, R, B],
    [G, B, R],
    [B, R, G],
    [B, G, R],
];

impl ColorOrder {
    pub const ALL: [ColorOrder; 6] = [
        ColorOrder::RGB,
        ColorOrder::RBG,
        ColorOrder::GRB,
        ColorOrder::GBR,
        ColorOrder::BRG,
        ColorOrder::BGR,
    ];

    /// Source channel for each of the three output byte positions
    pub const fn permutation(self, mapping: ChannelMapping) -> [Channel; 3] {
        let table = match mapping {
            ChannelMapping::Legacy => &LEGACY,
            ChannelMapping::Named => &NAMED,
        };
        table[self as usize]
    }

    /// Reorder `pixel`'s channels into wire order, scaled through `f`
    pub fn arrange<F>(self, mapping: ChannelMapping, pixel: &Pixel, mut f: F) -> [u8; 3]
    where
        F: FnMut(f32) -> u8,
    {
        let [a, b, c] = self.permutation(mapping);
        [f(pixel.channel(a)), f(pixel.channel(b)), f(pixel.channel(c))]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ColorOrder::RGB => "RGB",
            ColorOrder::RBG => "RBG",
            ColorOrder::GRB => "GRB",
            ColorOrder::GBR => "GBR",
            ColorOrder::BRG => "BRG",
            ColorOrder::BGR => "BGR",
        }
    }
}

impl fmt::Display for ColorOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown color order {0:?} (expected one of RGB, RBG, GRB, GBR, BRG, BGR)")]
pub struct ParseColorOrderError(pub String);

impl FromStr for ColorOrder {
    type Err = ParseColorOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorOrder::ALL
            .into_iter()
            .find(|order| order.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseColorOrderError(s.to_string()))
    }
}

impl TryFrom<String> for ColorOrder {
    type Error = ParseColorOrderError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ColorOrder> for &'static str {
    fn from(order: ColorOrder) -> Self {
        order.as_str()
    }
}
