use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use image::{Rgb, RgbImage};

/// Write a small synthetic glaucoma dataset for trying out the browser.
#[derive(Debug, Parser)]
struct Args {
    /// Output dataset root.
    #[arg(default_value = "sample_dataset")]
    out: PathBuf,
    /// Images per split and label.
    #[arg(long, default_value_t = 4)]
    per_class: usize,
    /// Edge length of the square images in pixels.
    #[arg(long, default_value_t = 256)]
    size: u32,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

/// Render a fundus-like image: dark background, orange retina, yellow optic
/// disc with a pale cup. Glaucomatous eyes get a larger cup-to-disc ratio.
fn render_fundus(size: u32, cup_ratio: f64, rng: &mut SimpleRng) -> (RgbImage, (f64, f64)) {
    let s = size as f64;
    let centre = s / 2.0;
    let retina_r = s * 0.46;
    let disc = (centre + rng.range(0.12, 0.22) * s, centre + rng.range(-0.05, 0.05) * s);
    let disc_r = s * rng.range(0.07, 0.09);
    let cup_r = disc_r * cup_ratio;
    let fovea = (centre - rng.range(0.08, 0.14) * s, centre + rng.range(-0.03, 0.03) * s);

    let img = RgbImage::from_fn(size, size, |x, y| {
        let (fx, fy) = (x as f64, y as f64);
        let dist = |p: (f64, f64)| ((fx - p.0).powi(2) + (fy - p.1).powi(2)).sqrt();
        let noise = (rng.next_f64() * 12.0) as u8;

        if dist((centre, centre)) > retina_r {
            return Rgb([noise / 2, noise / 2, noise / 2]);
        }
        let d_disc = dist(disc);
        if d_disc < cup_r {
            return Rgb([250, 240u8.saturating_sub(noise), 200]);
        }
        if d_disc < disc_r {
            return Rgb([245, 200u8.saturating_sub(noise), 90]);
        }
        // Retina darkens towards the fovea.
        let shade = (dist(fovea) / retina_r).min(1.0);
        Rgb([
            (120.0 + 90.0 * shade) as u8 + noise,
            (40.0 + 40.0 * shade) as u8,
            (10.0 + 15.0 * shade) as u8,
        ])
    });
    (img, fovea)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = SimpleRng::new(42);

    let splits = ["train", "validation", "test"];
    let labels = [("normal", 0.25..0.4), ("glaucoma", 0.6..0.85)];

    let metadata_dir = args.out.join("metadata");
    fs::create_dir_all(&metadata_dir).context("creating metadata directory")?;
    let metadata_path = metadata_dir.join("metadata.csv");
    let mut writer = csv::Writer::from_path(&metadata_path)
        .with_context(|| format!("creating {}", metadata_path.display()))?;
    writer.write_record([
        "filename", "split", "label", "patient", "eye", "acquired", "fovea_x", "fovea_y", "width",
        "height",
    ])?;

    let mut count = 0usize;
    for split in splits {
        let dir = args.out.join("images").join(split);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        for (label, cup) in &labels {
            for _ in 0..args.per_class {
                count += 1;
                let cup_ratio = rng.range(cup.start, cup.end);
                let (img, fovea) = render_fundus(args.size, cup_ratio, &mut rng);
                let filename = format!("img{count:03}.png");
                img.save(dir.join(&filename))
                    .with_context(|| format!("writing {filename}"))?;

                let eye = if count % 2 == 0 { "OD" } else { "OS" };
                let acquired = format!("2024-{:02}-{:02}", 1 + count % 12, 1 + count % 28);
                let row: [&str; 10] = [
                    &filename,
                    split,
                    label,
                    &format!("P{:04}", 100 + count / 2),
                    eye,
                    &acquired,
                    &format!("{:.1}", fovea.0),
                    &format!("{:.1}", fovea.1),
                    &args.size.to_string(),
                    &args.size.to_string(),
                ];
                writer.write_record(row)?;
                log::debug!("{split}/{filename}: {label}, cup ratio {cup_ratio:.2}");
            }
        }
    }
    writer.flush().context("flushing metadata")?;

    println!(
        "Wrote {count} images ({}x{} px) and {} to {}",
        args.size,
        args.size,
        metadata_path.display(),
        args.out.display()
    );
    Ok(())
}
