// ABOUTME: Image conversion into the PNG encoding the terminal's image store accepts
// ABOUTME: Native decoding via the image crate, or a configured external command

use cellpin_sdk::{Error, Result};
use image::ImageFormat;
use std::path::Path;
use std::process::Command;

use crate::config::{INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER};

/// Produces a PNG file at `output` from the image at `input`, or fails
pub trait Converter {
    fn convert(&self, input: &Path, output: &Path) -> Result<()>;

    fn name(&self) -> String;
}

/// Decodes with the `image` crate and re-encodes as PNG
pub struct NativeConverter;

impl Converter for NativeConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        let img = image::open(input)
            .map_err(|e| Error::Conversion(format!("cannot decode {}: {}", input.display(), e)))?;
        img.save_with_format(output, ImageFormat::Png)
            .map_err(|e| Error::Conversion(format!("cannot encode PNG: {}", e)))
    }

    fn name(&self) -> String {
        "built-in decoder".to_string()
    }
}

/// Runs a user-supplied command with `{input}` and `{output}` substituted
pub struct CommandConverter {
    argv: Vec<String>,
}

impl CommandConverter {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    fn expand(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.argv
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }
}

impl Converter for CommandConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        let argv = self.expand(input, output);
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::Conversion("converter command is empty".to_string()));
        };

        log::debug!("running converter: {}", argv.join(" "));
        let result = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| Error::Conversion(format!("cannot run {}: {}", program, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Error::Conversion(format!(
                "{} exited with {}: {}",
                program,
                result.status,
                stderr.trim()
            )));
        }
        if !output.exists() {
            return Err(Error::Conversion(format!(
                "{} did not produce {}",
                program,
                output.display()
            )));
        }
        Ok(())
    }

    fn name(&self) -> String {
        self.argv.first().cloned().unwrap_or_default()
    }
}

/// Pick the configured command, falling back to the built-in decoder
pub fn converter_for(template: Option<&[String]>) -> Box<dyn Converter> {
    match template {
        Some(argv) if !argv.is_empty() => Box::new(CommandConverter::new(argv.to_vec())),
        _ => Box::new(NativeConverter),
    }
}

pub fn is_png(bytes: &[u8]) -> bool {
    matches!(image::guess_format(bytes), Ok(ImageFormat::Png))
}

/// Bytes to upload for `source`: the file itself when it is already PNG,
/// otherwise the converter's output read back from a scratch directory.
pub fn prepare_payload(source: &[u8], path: &Path, converter: &dyn Converter) -> Result<Vec<u8>> {
    if is_png(source) {
        log::debug!("{} is already PNG, no conversion needed", path.display());
        return Ok(source.to_vec());
    }

    let scratch = tempfile::tempdir()
        .map_err(|e| Error::Conversion(format!("cannot create scratch directory: {}", e)))?;
    let output = scratch.path().join("converted.png");

    log::info!("converting {} with {}", path.display(), converter.name());
    converter.convert(path, &output)?;

    std::fs::read(&output)
        .map_err(|e| Error::Conversion(format!("cannot read converted image: {}", e)))
}
