//! scrollframe demo - plays a directory of frames against a simulated scroll sweep
//! and writes the final surface to a PNG.

use anyhow::{bail, Context, Result};
use clap::Parser;
use scrollframe::{
    ConfigOverrides, ImageSource, LargeOverrides, PixelSurface, ScaleMode, ScrollAxis, ScrollFrame,
    ScrollPosition,
};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp", "tif", "tiff"];

/// Scroll-driven image sequence player
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of frames, played in file name order
    #[arg(value_name = "DIR")]
    frames: PathBuf,

    /// Where to write the last drawn surface
    #[arg(short = 'o', long = "output", value_name = "PNG", default_value = "scrollframe.png")]
    output: PathBuf,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 360)]
    height: u32,

    /// contain, cover or fill
    #[arg(short = 's', long = "scale-mode", value_name = "MODE")]
    scale_mode: Option<ScaleMode>,

    /// Progressive loading factor (power of two > 2)
    #[arg(long, value_name = "N")]
    factor: Option<usize>,

    /// Load every frame up front instead of progressively
    #[arg(long)]
    flat: bool,

    /// Keep only every Nth frame; the others resolve to absent
    #[arg(short = 'r', long = "ratio", value_name = "N", default_value_t = 1)]
    ratio: usize,

    /// JSON file with configuration overrides
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of scroll positions in the sweep
    #[arg(long, value_name = "N", default_value_t = 24)]
    steps: usize,

    /// Scrollable extent of the simulated page, in pixels
    #[arg(long, value_name = "PX", default_value_t = 4000.0)]
    scroll_height: f64,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbosity: u8,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn list_frames(dir: &Path) -> Result<Vec<String>> {
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Cannot read {}", dir.display()))? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_frame {
            frames.push(path.to_string_lossy().into_owned());
        }
    }
    frames.sort();
    if frames.len() < 2 {
        bail!("{} holds {} frames, need at least 2", dir.display(), frames.len());
    }
    Ok(frames)
}

fn overrides(args: &Args) -> Result<ConfigOverrides> {
    let mut overrides = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read config {}", path.display()))?;
            ConfigOverrides::from_json(&text)?
        }
        None => ConfigOverrides::default(),
    };

    if args.scale_mode.is_some() {
        overrides.scale_mode = args.scale_mode;
    }
    if args.factor.is_some() || args.flat {
        let large = overrides.large.get_or_insert_with(LargeOverrides::default);
        if args.factor.is_some() {
            large.factor = args.factor;
        }
        if args.flat {
            large.enabled = Some(false);
        }
    }
    Ok(overrides)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbosity);

    let frames: Rc<[String]> = list_frames(&args.frames)?.into();
    let total = frames.len();
    log::info!("Found {} frames in {}", total, args.frames.display());

    // Owned by the demo and read by the factory on every call.
    let ratio = Rc::new(Cell::new(args.ratio.max(1)));

    let ex = Rc::new(smol::LocalExecutor::new());
    let surface = PixelSurface::shared(args.width, args.height);
    let scroll = Rc::new(ScrollPosition::new(0.0, args.scroll_height));

    let factory_frames = frames.clone();
    let factory_ratio = ratio.clone();
    let player = ScrollFrame::builder(ex.clone())
        .surface(surface.clone())
        .scroll_source(scroll.clone())
        .scroll_axis(ScrollAxis::Y)
        .linear_mapping()
        .image_factory(total, move |index| {
            let keep = index % factory_ratio.get() == 0;
            let locator = factory_frames.get(index).cloned();
            async move {
                match locator {
                    Some(locator) if keep => Ok(ImageSource::Locator(locator)),
                    Some(_) => Ok(ImageSource::Absent),
                    None => bail!("no frame file for index {}", index),
                }
            }
        })
        .overrides(overrides(&args)?)
        .on_frame(|frame, offset| log::debug!("frame {} at {:.3}", frame, offset))
        .on_complete(|| log::info!("Reached the last frame"))
        .on_init_complete(|| log::info!("Initialization complete"))
        .on_error(|err| log::warn!("{}", err))
        .build()?;

    let interval = player.config().frame_interval();
    let start = Instant::now();

    smol::block_on(ex.run(async {
        player.init().await?;
        log::info!(
            "Ready after {:?}: {} of {} frames loaded",
            start.elapsed(),
            player.loaded_frames(),
            player.total_frames()
        );

        player.play();
        let steps = args.steps.max(1);
        for step in 0..=steps {
            let offset = args.scroll_height * step as f64 / steps as f64;
            scroll.scroll_to(ScrollAxis::Y, offset);
            player.handle_scroll();
            smol::Timer::after(interval * 2).await;
        }

        while player.is_background_loading() {
            smol::Timer::after(interval).await;
        }
        player.pause();
        anyhow::Ok(())
    }))?;

    log::info!(
        "Done after {:?}: frame {} of {}, {} bitmaps drawn",
        start.elapsed(),
        player.current_frame(),
        player.total_frames(),
        surface.borrow().frames_drawn()
    );

    surface
        .borrow()
        .save(&args.output)
        .with_context(|| format!("Cannot write {}", args.output.display()))?;
    println!("{}", args.output.display());

    player.destroy();
    Ok(())
}
