#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use medenhance_contracts::providers::{NamedProvider, ProviderRegistry};
use medenhance_engine::analysis::{ProviderReply, SharedProvider};
use medenhance_engine::{AnalysisChain, EnhancementPipeline, PromptContext, TextAnalysisProvider};

pub fn noise_gray(width: u32, height: u32, seed: u64) -> DynamicImage {
    let mut state = seed;
    DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |_, _| {
        state = next(state);
        Luma([(state >> 33) as u8])
    }))
}

pub fn noise_rgb(width: u32, height: u32, seed: u64) -> DynamicImage {
    let mut state = seed;
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
        state = next(state);
        Rgb([(state >> 33) as u8, (state >> 41) as u8, (state >> 49) as u8])
    }))
}

fn next(state: u64) -> u64 {
    state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407)
}

pub fn png_bytes(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

pub enum Script {
    Reply(&'static str),
    Fail(&'static str),
    Sleep(Duration, &'static str),
}

pub struct FakeProvider {
    name: &'static str,
    script: Script,
}

impl FakeProvider {
    pub fn shared(name: &'static str, script: Script) -> SharedProvider {
        Arc::new(Self { name, script })
    }
}

impl NamedProvider for FakeProvider {
    fn name(&self) -> &str {
        self.name
    }
}

impl TextAnalysisProvider for FakeProvider {
    fn try_analyze(&self, _context: &PromptContext, _timeout: Duration) -> Result<ProviderReply> {
        match self.script {
            Script::Reply(text) => Ok(ProviderReply {
                text: text.to_string(),
                model: Some(format!("{}-model", self.name)),
            }),
            Script::Fail(reason) => bail!("{reason}"),
            Script::Sleep(delay, text) => {
                thread::sleep(delay);
                Ok(ProviderReply {
                    text: text.to_string(),
                    model: None,
                })
            }
        }
    }
}

pub fn chain(providers: Vec<SharedProvider>, timeout: Duration) -> AnalysisChain {
    AnalysisChain::new(ProviderRegistry::new(providers), timeout)
}

/// Pipeline whose only provider answers instantly.
pub fn pipeline_with_reply(text: &'static str) -> EnhancementPipeline {
    EnhancementPipeline::new(chain(
        vec![FakeProvider::shared("fake", Script::Reply(text))],
        Duration::from_secs(5),
    ))
}

/// Pipeline whose providers always fail.
pub fn failing_pipeline() -> EnhancementPipeline {
    EnhancementPipeline::new(chain(
        vec![
            FakeProvider::shared("primary", Script::Fail("primary unavailable")),
            FakeProvider::shared("backup", Script::Fail("backup unavailable")),
        ],
        Duration::from_secs(5),
    ))
}
