use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use ising::denoise::{accuracy, corrupt, DenoiseConfig, DenoiseSession};

// NB vertical stripes, 4 sites wide, over the torus.
fn striped_image(height: usize, width: usize) -> Vec<i8> {
    (0..height * width)
        .map(|i| if ((i % width) / 4) % 2 == 0 { 1 } else { -1 })
        .collect()
}

fn main() {
    env_logger::init();

    let (height, width) = (32, 32);
    let clean = striped_image(height, width);

    let mut rng = StdRng::seed_from_u64(2024);
    let noisy = corrupt(&clean, 0.1, &mut rng);
    info!("noisy accuracy: {:.4}", accuracy(&noisy, &clean));

    let mut config = DenoiseConfig::new(0.9, 2.0, 50_000, 200_000);
    config.schedule.save_frames_iter = 20;

    let session = DenoiseSession::new(&noisy, height, width, &config)
        .expect("valid demo configuration");

    // Snapshot sink stands in for the frame renderer; here it just logs.
    let mut sink = |iteration: usize, avg: &[f64]| {
        let mean: f64 = avg.iter().sum::<f64>() / avg.len() as f64;
        info!("snapshot at step {}: mean magnetization {:.4}", iteration, mean);
    };

    let out = session
        .run(&mut rng, Some(&clean), Some(&mut sink))
        .expect("dimensions already validated");

    info!("denoised accuracy: {:.4}", accuracy(&out.denoised, &clean));
    if let Some(trace) = &out.accuracy_trace {
        info!("final trace entry: {:.4}", trace.last().copied().unwrap_or(0.0));
    }

    info!("Done.");
}
