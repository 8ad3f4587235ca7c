use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use dicom_viewport::{RendererKind, SortBy, ViewType, Viewer, ViewerConfig, ViewerError};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Renderer {
    Frame,
    Volume,
    Gpu,
}

impl From<Renderer> for RendererKind {
    fn from(renderer: Renderer) -> Self {
        match renderer {
            Renderer::Frame => RendererKind::Frame,
            Renderer::Volume => RendererKind::Volume,
            Renderer::Gpu => RendererKind::Gpu,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum View {
    Axial,
    Coronal,
    Sagittal,
}

impl From<View> for ViewType {
    fn from(view: View) -> Self {
        match view {
            View::Axial => ViewType::Axial,
            View::Coronal => ViewType::Coronal,
            View::Sagittal => ViewType::Sagittal,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Order {
    Identifier,
    InstanceNumber,
    SliceLocation,
    None,
}

impl From<Order> for SortBy {
    fn from(order: Order) -> Self {
        match order {
            Order::Identifier => SortBy::Identifier,
            Order::InstanceNumber => SortBy::InstanceNumber,
            Order::SliceLocation => SortBy::SliceLocation,
            Order::None => SortBy::None,
        }
    }
}

/// Render one view of a DICOM series to a PNG file
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Directory holding the .dcm files
    #[arg(default_value = "dicom")]
    directory: PathBuf,

    #[arg(short, long, value_enum, default_value_t = Renderer::Frame)]
    renderer: Renderer,

    /// View used by the volume renderer
    #[arg(short, long, value_enum, default_value_t = View::Axial)]
    view: View,

    #[arg(long, value_enum, default_value_t = Order::Identifier)]
    sort_by: Order,

    #[arg(long, default_value_t = 512)]
    width: u32,

    #[arg(long, default_value_t = 512)]
    height: u32,

    /// Window center, defaults to the first frame's
    #[arg(long, requires = "window_width", allow_negative_numbers = true)]
    window_center: Option<i32>,

    /// Window width, defaults to the first frame's
    #[arg(long, requires = "window_center")]
    window_width: Option<i32>,

    #[arg(short, long, default_value = "result.png")]
    output: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(err) = run(args).await {
        log::error!("{err}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), ViewerError> {
    let config = ViewerConfig::default()
        .with_renderer(args.renderer.into())
        .with_initial_view(args.view.into())
        .with_sort_by(args.sort_by.into());
    let mut viewer =
        Viewer::open_directory(&args.directory, args.width, args.height, config).await?;

    if let (Some(center), Some(width)) = (args.window_center, args.window_width) {
        viewer.viewport_mut().set_window(center, width);
    }

    let image = viewer.render()?;
    image
        .save(&args.output)
        .map_err(|err| ViewerError::Io(std::io::Error::other(err)))?;
    log::info!("Wrote {}", args.output.display());
    Ok(())
}
