//! Demo: Sequenced Bass Line
//!
//! Runs the full runtime (render thread, sequencer thread, controller input)
//! for a couple of seconds, collecting the output into memory instead of a
//! sound card, then prints a short report.
//!
//! Run with: cargo run --example sequenced_bass

use monosynth::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Sink that keeps the last few seconds of audio and paces itself to real time
struct CaptureSink {
    samples: Arc<parking_lot::Mutex<Vec<f32>>>,
    block_time: Duration,
}

impl AudioSink for CaptureSink {
    fn write(&mut self, block: &[f32]) -> monosynth::Result<()> {
        self.samples.lock().extend_from_slice(block);
        thread::sleep(self.block_time);
        Ok(())
    }
}

fn main() -> monosynth::Result<()> {
    let config = Config::from_json(
        r#"{
            "synth": { "cutoff": 1800.0, "resonance": 0.4, "release": 0.08,
                       "osc1": { "waveform": "square" } },
            "sequencer": { "bpm": 132.0, "root": 36, "scale": "dorian" }
        }"#,
    )?;

    println!("=== Sequenced Bass Demo ===\n");
    println!("{}\n", config.to_json()?);

    let (engine, renderer) = SynthEngine::new(&config.synth);
    let mapping = Arc::new(ParameterMap::new());
    let router = MidiRouter::new(engine.clone(), Arc::clone(&mapping));

    let samples = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = CaptureSink {
        samples: Arc::clone(&samples),
        block_time: Duration::from_secs_f64(BLOCK_FRAMES as f64 / config.synth.sample_rate),
    };

    let token = StopToken::new();
    let render = spawn_render_loop(renderer, sink, token.clone())?;

    let sequencer = Sequencer::new(engine.clone(), &config.sequencer);
    for (step, degree) in [0, 0, 4, 2, 0, 7, 6, 4].into_iter().enumerate() {
        sequencer.set_step(step * 2, true, degree)?;
    }
    sequencer.start();
    let clock = sequencer.spawn(token.clone())?;

    // Learn CC 20 → osc2 pitch, then sweep the filter open over two bars
    mapping.toggle_learn();
    mapping.select_parameter(Parameter::Osc2Pitch);
    router.handle_message(&[0xB0, 20, 0]);
    router.handle_message(&[0xB0, 20, 70]);

    for value in (20..=110).step_by(10) {
        router.handle_message(&[0xB0, 74, value]);
        thread::sleep(Duration::from_millis(200));
    }

    sequencer.stop();
    thread::sleep(Duration::from_millis(150));
    token.cancel();

    clock.join().ok();
    match render.join() {
        Ok(result) => result?,
        Err(_) => return Err(Error::Sink("render thread panicked".into())),
    }

    let samples = samples.lock();
    let peak = samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
    let rms = (samples.iter().map(|s| s * s).sum::<f32>() / samples.len().max(1) as f32).sqrt();

    println!(
        "Rendered {} samples ({:.2}s)",
        samples.len(),
        samples.len() as f64 / config.synth.sample_rate
    );
    println!("Peak: {peak:.3}  RMS: {rms:.3}");
    println!("Filter cutoff: {:.0} Hz", engine.filter().cutoff());
    println!("Osc2 detune: {} cents", engine.osc2().cents());
    println!("Controller map:");
    for (cc, parameter) in mapping.assignments() {
        println!("  CC {cc:3} → {parameter}");
    }

    Ok(())
}
