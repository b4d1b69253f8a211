//! Audio file loading, resampling, and saving
//!
//! Decodes any symphonia-supported container/codec into a planar
//! [`Sample`] with the channel count preserved, resamples with rubato when
//! an output rate is requested, and writes 32-bit float WAV.

use anyhow::{anyhow, bail, Context};
use crest_core::Sample;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{info, warn};

/// `hh:mm:ss.mmm` form of a buffer's duration
fn format_duration(sample: &Sample) -> String {
    let millis = (sample.duration_secs() * 1000.0).round() as u64;
    let (ms, rest) = (millis % 1000, millis / 1000);
    let (s, rest) = (rest % 60, rest / 60);
    let (m, h) = (rest % 60, rest / 60);
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

/// Append one decoded packet's planar samples, converting to f32
///
/// Signed integers use symmetric scaling (divide by 2^(N-1)) so the
/// [-1.0, 1.0) range is symmetric; unsigned formats are re-centered.
fn extend_planar<S: Copy + symphonia::core::sample::Sample>(
    channels: &mut [Vec<f32>],
    buf: &AudioBuffer<S>,
    convert: impl Fn(S) -> f32,
) {
    for (ch, dst) in channels.iter_mut().enumerate() {
        dst.extend(buf.chan(ch).iter().map(|&s| convert(s)));
    }
}

fn append_decoded(channels: &mut [Vec<f32>], decoded: &AudioBufferRef<'_>) {
    match decoded {
        AudioBufferRef::F32(buf) => extend_planar(channels, buf, |s| s),
        AudioBufferRef::F64(buf) => extend_planar(channels, buf, |s| s as f32),
        AudioBufferRef::S32(buf) => extend_planar(channels, buf, |s| s as f32 / 2147483648.0),
        AudioBufferRef::S24(buf) => {
            extend_planar(channels, buf, |s| s.inner() as f32 / 8388608.0);
        }
        AudioBufferRef::S16(buf) => extend_planar(channels, buf, |s| s as f32 / 32768.0),
        AudioBufferRef::S8(buf) => extend_planar(channels, buf, |s| s as f32 / 128.0),
        AudioBufferRef::U32(buf) => {
            extend_planar(channels, buf, |s| (s as f32 / u32::MAX as f32) * 2.0 - 1.0);
        }
        AudioBufferRef::U24(buf) => {
            extend_planar(channels, buf, |s| (s.inner() as f32 / 16777215.0) * 2.0 - 1.0);
        }
        AudioBufferRef::U16(buf) => {
            extend_planar(channels, buf, |s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0);
        }
        AudioBufferRef::U8(buf) => {
            extend_planar(channels, buf, |s| (s as f32 / u8::MAX as f32) * 2.0 - 1.0);
        }
    }
}

/// Decode a whole audio file into a planar sample buffer
pub fn load_audio_file(path: &Path) -> anyhow::Result<Sample> {
    if !path.exists() {
        bail!("input file not found: {}", path.display());
    }

    let file = std::fs::File::open(path)
        .with_context(|| format!("could not open '{}'", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("could not read '{}'", path.display()))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no audio track in '{}'", path.display()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("unknown sample rate in '{}'", path.display()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("could not create decoder")?;

    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(err).context("failed reading packet"),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if channels.is_empty() {
                    channels = vec![Vec::new(); decoded.spec().channels.count()];
                }
                append_decoded(&mut channels, &decoded);
            }
            Err(SymphoniaError::DecodeError(err)) => {
                warn!("skipping undecodable packet: {err}");
            }
            Err(err) => return Err(err).context("decode failed"),
        }
    }

    if channels.is_empty() {
        bail!("no audio data decoded from '{}'", path.display());
    }

    let sample = Sample::from_channels(channels, sample_rate)?;
    info!(
        "loaded file: '{}', channels: {}, samples: {}, sample rate: {}, duration: {}",
        path.display(),
        sample.channels(),
        sample.len(),
        sample.sample_rate(),
        format_duration(&sample)
    );

    Ok(sample)
}

/// Resample every channel to `target_rate`
pub fn resample(sample: &Sample, target_rate: u32) -> anyhow::Result<Sample> {
    if target_rate == sample.sample_rate() || sample.is_empty() {
        let mut out = sample.clone();
        out.set_sample_rate(target_rate);
        return Ok(out);
    }

    let channels = sample.channels();
    let ratio = f64::from(target_rate) / f64::from(sample.sample_rate());
    let chunk = 1024_usize;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk, channels)
        .context("could not create resampler")?;

    let delay = resampler.output_delay();
    let expected = (sample.len() as f64 * ratio).round() as usize;
    let mut out: Vec<Vec<f32>> = vec![Vec::new(); channels];

    let mut pos = 0;
    while out[0].len() < delay + expected {
        let end = (pos + chunk).min(sample.len());
        let frames: Vec<Vec<f32>> = (0..channels)
            .map(|ch| {
                let mut v = if pos < end {
                    sample.channel(ch)[pos..end].to_vec()
                } else {
                    Vec::new()
                };
                v.resize(chunk, 0.0);
                v
            })
            .collect();
        pos = end;

        let processed = resampler.process(&frames, None).context("resampling failed")?;
        for (ch, data) in processed.into_iter().enumerate() {
            out[ch].extend(data);
        }
    }

    // Drop the resampler's group delay and trim to the expected length
    for ch in &mut out {
        ch.drain(..delay.min(ch.len()));
        ch.truncate(expected);
    }

    let resampled = Sample::from_channels(out, target_rate)?;
    info!(
        "resampled to {} Hz, samples: {}",
        target_rate,
        resampled.len()
    );

    Ok(resampled)
}

/// Write a sample buffer as 32-bit float WAV
pub fn save_audio_file(path: &Path, sample: &Sample) -> anyhow::Result<()> {
    if sample.channels() == 0 {
        bail!("nothing to save: sample has no channels");
    }

    let spec = hound::WavSpec {
        channels: sample.channels() as u16,
        sample_rate: sample.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("could not create '{}'", path.display()))?;

    for j in 0..sample.len() {
        for ch in 0..sample.channels() {
            writer.write_sample(sample.channel(ch)[j])?;
        }
    }
    writer.finalize().context("could not finalize WAV file")?;

    info!(
        "saved file: '{}', channels: {}, samples: {}, sample rate: {}, duration: {}",
        path.display(),
        sample.channels(),
        sample.len(),
        sample.sample_rate(),
        format_duration(sample)
    );

    Ok(())
}
