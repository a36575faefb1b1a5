use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use cirrus_upload::{scaled_url, ExportPreset, Size};

pub const USAGE: &str = "usage:
  uploader upload-image <file>
  uploader upload-video <file> [WIDTHxHEIGHT]
  uploader remove <delivery-url>
  uploader scale <width> <height> <delivery-url> <MAXWxMAXH>";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    UploadImage {
        path: PathBuf,
    },
    UploadVideo {
        path: PathBuf,
        preset: Option<ExportPreset>,
    },
    Remove {
        url: String,
    },
    Scale {
        width: u32,
        height: u32,
        url: String,
        max: Size,
    },
}

impl Command {
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        let (name, rest) = args.split_first().ok_or_else(|| anyhow!("{USAGE}"))?;

        match (name.as_str(), rest) {
            ("upload-image", [path]) => Ok(Command::UploadImage { path: path.into() }),
            ("upload-video", [path]) => Ok(Command::UploadVideo {
                path: path.into(),
                preset: None,
            }),
            ("upload-video", [path, preset]) => Ok(Command::UploadVideo {
                path: path.into(),
                preset: Some(preset.parse()?),
            }),
            ("remove", [url]) => Ok(Command::Remove { url: url.clone() }),
            ("scale", [width, height, url, max]) => Ok(Command::Scale {
                width: width.parse().with_context(|| format!("bad width '{width}'"))?,
                height: height.parse().with_context(|| format!("bad height '{height}'"))?,
                url: url.clone(),
                max: parse_size(max)?,
            }),
            _ => bail!("{USAGE}"),
        }
    }
}

fn parse_size(value: &str) -> Result<Size> {
    let (w, h) = value
        .split_once('x')
        .ok_or_else(|| anyhow!("size '{value}' is not WIDTHxHEIGHT"))?;
    Ok(Size::new(
        w.parse().with_context(|| format!("bad width in '{value}'"))?,
        h.parse().with_context(|| format!("bad height in '{value}'"))?,
    ))
}

/// Delivery URL for an asset of `width`x`height` shown within `max`
pub fn scale(width: u32, height: u32, url: &str, max: Size) -> Result<String> {
    Ok(scaled_url(width, height, url, max)?)
}
