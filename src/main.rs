//! ZVA CLI - video stream analyzer
//!
//! Drives the analyzer headlessly: decode up to a picture, switch overlays on,
//! write the composited view as PNG and print bit-accounting reports.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use tracing::info;
use zva_lib::analyzer::{DecodeSession, MAX_ZOOM, MIN_ZOOM};
use zva_lib::codec::{self, raw};
use zva_lib::format::{self, FileSource, OggWriter};
use zva_lib::util::PlaneMask;
use zva_lib::{init, Analyzer, AnalyzerConfig, Config};

#[derive(Parser)]
#[command(name = "zva")]
#[command(about = "ZVA - frame-by-frame video stream analyzer", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show stream parameters and count pictures
    Info {
        /// Input Ogg file
        input: PathBuf,

        /// Decoder to use
        #[arg(long, default_value = "raw")]
        codec: String,
    },

    /// Decode to a picture and render it with overlays
    Analyze {
        /// Input Ogg file
        input: PathBuf,

        /// Decoder to use
        #[arg(long, default_value = "raw")]
        codec: String,

        /// Picture index to seek to
        #[arg(short, long, default_value = "0")]
        frame: i64,

        /// Zoom factor
        #[arg(short, long, default_value = "1")]
        zoom: usize,

        /// Outline transform blocks
        #[arg(long)]
        blocks: bool,

        /// Outline motion partitions
        #[arg(long)]
        motion: bool,

        /// Color skipped bands
        #[arg(long)]
        skip: bool,

        /// Color unreferenced bands
        #[arg(long)]
        noref: bool,

        /// Show the padded area
        #[arg(long)]
        padding: bool,

        /// Bit-cost heat map (requests accounting from the decoder)
        #[arg(long)]
        bits: bool,

        /// Color deringing strength
        #[arg(long)]
        dering: bool,

        /// Hide the luma plane
        #[arg(long)]
        hide_y: bool,

        /// Hide the Cb plane
        #[arg(long)]
        hide_u: bool,

        /// Hide the Cr plane
        #[arg(long)]
        hide_v: bool,

        /// Comma-separated symbol name filter for bit accounting
        #[arg(long, default_value = "")]
        filter: String,

        /// Write the composited view to this PNG file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the bit-accounting report
        #[arg(long)]
        report: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Probe display positions, given as X,Y
        #[arg(long, value_name = "X,Y")]
        probe: Vec<String>,
    },

    /// Wrap a YUV4MPEG2 file into an Ogg stream of raw pictures
    Pack {
        /// Input .y4m file
        #[arg(short, long)]
        input: PathBuf,

        /// Output Ogg file
        #[arg(short, long)]
        output: PathBuf,

        /// Logical stream serial number
        #[arg(long, default_value = "1")]
        serial: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config {
        verbose: cli.verbose,
        debug: cli.debug,
    };
    init(config)?;

    info!("ZVA v{}", zva_lib::VERSION);

    match cli.command {
        Commands::Info { input, codec } => cmd_info(&input, &codec)?,
        Commands::Analyze {
            input,
            codec,
            frame,
            zoom,
            blocks,
            motion,
            skip,
            noref,
            padding,
            bits,
            dering,
            hide_y,
            hide_u,
            hide_v,
            filter,
            output,
            report,
            json,
            probe,
        } => {
            if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
                bail!("zoom must be between {} and {}", MIN_ZOOM, MAX_ZOOM);
            }
            let config = AnalyzerConfig {
                bit_accounting: bits || report || json,
                zoom,
                show_padding: padding,
                filter,
            };
            let mut analyzer = open_analyzer(&input, &codec, &config)?;
            analyzer
                .goto_frame(frame)
                .with_context(|| format!("Failed to seek to picture {}", frame))?;

            analyzer.set_show_blocks(blocks)?;
            analyzer.set_show_motion(motion)?;
            analyzer.set_show_skip(skip)?;
            analyzer.set_show_noref(noref)?;
            analyzer.set_show_dering(dering)?;
            if bits {
                analyzer
                    .set_show_bits(true)
                    .context("This decoder does not provide bit accounting")?;
            }
            for (plane, hidden) in [
                (PlaneMask::LUMA, hide_y),
                (PlaneMask::CB, hide_u),
                (PlaneMask::CR, hide_v),
            ] {
                analyzer.set_plane_visible(plane, !hidden)?;
            }

            println!("{}", analyzer.title());

            if report || json {
                match analyzer.report() {
                    Some(r) if json => println!("{}", r.to_json()?),
                    Some(r) => print!("{}", r.to_table(atty_stdout())),
                    None => println!("No bit accounting available for this stream"),
                }
            }

            for pos in &probe {
                let (x, y) = parse_position(pos)?;
                let status = analyzer.probe(x, y);
                println!(
                    "{}  {}  {}",
                    status.position,
                    status.sample.as_deref().unwrap_or("-"),
                    status.detail
                );
            }

            if let Some(path) = output {
                save_png(&analyzer, &path)?;
                println!("Wrote {}", path.display());
            }
        }
        Commands::Pack {
            input,
            output,
            serial,
        } => {
            info!("Packing {} -> {}", input.display(), output.display());
            cmd_pack(&input, &output, serial)?;
        }
    }

    Ok(())
}

fn open_analyzer(
    input: &Path,
    codec_name: &str,
    config: &AnalyzerConfig,
) -> anyhow::Result<Analyzer<FileSource>> {
    check_container(input)?;
    let codec = codec::find_codec(codec_name)
        .with_context(|| format!("Unknown codec '{}'", codec_name))?;
    let source = FileSource::open(input)?;
    let analyzer = Analyzer::open(codec, source, config)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    Ok(analyzer)
}

/// Leading bytes read to identify a container
const MAGIC_SIZE: usize = 16;

fn check_container(input: &Path) -> anyhow::Result<()> {
    let file = File::open(input).with_context(|| format!("Cannot open {}", input.display()))?;
    let mut magic = Vec::with_capacity(MAGIC_SIZE);
    file.take(MAGIC_SIZE as u64)
        .read_to_end(&mut magic)
        .with_context(|| format!("Cannot read {}", input.display()))?;
    match format::detect_format_from_magic(&magic) {
        Some("ogg") => Ok(()),
        Some(other) => bail!(
            "{} is a {} file; only Ogg streams can be analyzed (try `zva pack`)",
            input.display(),
            other
        ),
        None => bail!("{} is not an Ogg file", input.display()),
    }
}

fn cmd_info(input: &Path, codec_name: &str) -> anyhow::Result<()> {
    check_container(input)?;
    let codec = codec::find_codec(codec_name)
        .with_context(|| format!("Unknown codec '{}'", codec_name))?;
    let mut session = DecodeSession::new(codec, false);
    session
        .open(FileSource::open(input)?)
        .with_context(|| format!("Failed to open {}", input.display()))?;

    println!("File: {}", input.display());
    if let Some(info) = session.info() {
        println!("Codec: {}", info.codec);
        println!("Picture: {}x{}", info.pic_width, info.pic_height);
        println!("Chroma decimation: {}x{}", info.chroma_xdec, info.chroma_ydec);
    }
    if let Some(g) = session.geometry() {
        println!("Frame: {}x{}", g.frame_width, g.frame_height);
        println!("Padding: {}", if g.has_padding() { "yes" } else { "no" });
    }

    loop {
        match session.step() {
            Ok(_) => {}
            Err(e) if e.is_end_of_stream() => break,
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Decoding stopped at picture {}", session.picture_count())
                })
            }
        }
    }
    println!("Pictures: {}", session.picture_count());
    Ok(())
}

fn cmd_pack(input: &Path, output: &Path, serial: u32) -> anyhow::Result<()> {
    let file = File::open(input).with_context(|| format!("Cannot open {}", input.display()))?;
    let mut decoder = y4m::decode(BufReader::new(file))
        .map_err(|e| anyhow::anyhow!("Failed to decode Y4M header: {}", e))?;

    let (xdec, ydec) = match decoder.get_colorspace() {
        y4m::Colorspace::C420 | y4m::Colorspace::C420jpeg | y4m::Colorspace::C420paldv => (1, 1),
        y4m::Colorspace::C422 => (1, 0),
        y4m::Colorspace::C444 => (0, 0),
        other => bail!("Unsupported Y4M colorspace {:?}", other),
    };
    let (width, height) = (decoder.get_width(), decoder.get_height());

    let out = File::create(output).with_context(|| format!("Cannot create {}", output.display()))?;
    let mut writer = OggWriter::new(BufWriter::new(out), serial);
    writer.write_packet(&raw::header_packet(width as u32, height as u32, xdec, ydec), 0, false)?;

    // Each picture is written once the next one is known, so the last can carry EOS
    let mut pending: Option<Vec<u8>> = None;
    let mut count: i64 = 0;
    loop {
        let frame = match decoder.read_frame() {
            Ok(frame) => frame,
            Err(y4m::Error::EOF) => break,
            Err(e) => bail!("Failed to read Y4M frame {}: {}", count, e),
        };
        let mut data = Vec::with_capacity(raw::picture_size(width, height, xdec, ydec));
        data.extend_from_slice(frame.get_y_plane());
        data.extend_from_slice(frame.get_u_plane());
        data.extend_from_slice(frame.get_v_plane());
        if let Some(prev) = pending.replace(data) {
            count += 1;
            writer.write_packet(&prev, count, false)?;
        }
    }
    match pending {
        Some(last) => {
            count += 1;
            writer.write_packet(&last, count, true)?;
        }
        None => bail!("{} contains no pictures", input.display()),
    }
    writer.into_inner()?;

    println!("Packed {} pictures ({}x{}) into {}", count, width, height, output.display());
    Ok(())
}

fn save_png(analyzer: &Analyzer<FileSource>, path: &Path) -> anyhow::Result<()> {
    let (w, h) = analyzer.display_size();
    let image = image::RgbImage::from_raw(w as u32, h as u32, analyzer.pixels().to_vec())
        .context("Display buffer does not match its dimensions")?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn parse_position(pos: &str) -> anyhow::Result<(usize, usize)> {
    let (x, y) = pos
        .split_once(',')
        .with_context(|| format!("Probe position '{}' is not X,Y", pos))?;
    let x = x.trim().parse().with_context(|| format!("Bad X in '{}'", pos))?;
    let y = y.trim().parse().with_context(|| format!("Bad Y in '{}'", pos))?;
    Ok((x, y))
}

fn atty_stdout() -> bool {
    use std::io::IsTerminal;
    std::io::stdout().is_terminal()
}
