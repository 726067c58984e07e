#[macro_use] extern crate clap;

use clap::builder::PossibleValuesParser;
use clap::{value_parser, Arg, ArgAction, Command};
use gifcrop::progress::{NoProgress, ProgressReporter};
use gifcrop::quantize::QuantizerKind;
use gifcrop::{Filter, Rect, Settings};
use pbr::ProgressBar;

use std::ffi::OsStr;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

pub type BinResult<T, E = Box<dyn std::error::Error + Send + Sync>> = Result<T, E>;

fn main() {
    if let Err(e) = bin_main() {
        eprintln!("error: {e}");
        if let Some(e) = e.source() {
            eprintln!("error: {e}");
        }
        std::process::exit(1);
    }
}

fn bin_main() -> BinResult<()> {
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about("Crops, resizes and re-quantizes animated GIFs")
        .arg_required_else_help(true)
        .arg(Arg::new("output")
            .long("output")
            .short('o')
            .help("Destination file to write to; \"-\" means stdout")
            .num_args(1)
            .value_parser(value_parser!(std::ffi::OsString))
            .value_name("a.gif")
            .required(true))
        .arg(Arg::new("crop")
            .long("crop")
            .help("Region to keep, before resizing")
            .value_name("x,y,wxh")
            .conflicts_with("crop-square"))
        .arg(Arg::new("crop-square")
            .long("crop-square")
            .help("Square region to keep, before resizing")
            .value_name("x,y,size"))
        .arg(Arg::new("width")
            .long("width")
            .short('W')
            .value_parser(value_parser!(u32))
            .value_name("px")
            .help("Resize to this width"))
        .arg(Arg::new("height")
            .long("height")
            .short('H')
            .value_parser(value_parser!(u32))
            .value_name("px")
            .help("Resize to this height (stretches if the width is also set)"))
        .arg(Arg::new("filter")
            .long("filter")
            .value_parser(PossibleValuesParser::new(["lanczos", "nearest", "triangle", "catrom", "mitchell"]))
            .default_value("lanczos")
            .help("Resampling filter used for resizing"))
        .arg(Arg::new("colors")
            .long("colors")
            .short('c')
            .value_parser(value_parser!(u16).range(2..=256))
            .default_value("256")
            .value_name("2-256")
            .help("Maximum number of colors in each frame's palette"))
        .arg(Arg::new("threads")
            .long("threads")
            .short('j')
            .value_parser(value_parser!(usize))
            .value_name("num")
            .help("Number of worker threads; 0 starts one per frame. Defaults to the number of CPUs"))
        .arg(Arg::new("quantizer")
            .long("quantizer")
            .value_parser(PossibleValuesParser::new(["liq", "median-cut"]))
            .default_value("liq")
            .help("Palette selection algorithm"))
        .arg(Arg::new("dither")
            .long("dither")
            .value_parser(value_parser!(f32))
            .default_value("1")
            .value_name("0-1")
            .help("Amount of Floyd-Steinberg dithering"))
        .arg(Arg::new("fast")
            .long("fast")
            .action(ArgAction::SetTrue)
            .help("Faster quantization, but worse quality"))
        .arg(Arg::new("quiet")
            .long("quiet")
            .short('q')
            .action(ArgAction::SetTrue)
            .help("Do not display anything on standard output/console"))
        .arg(Arg::new("FILE")
            .help("Animated GIF to read; \"-\" means stdin")
            .value_parser(value_parser!(std::ffi::OsString))
            .required(true))
        .get_matches_from(wild::args_os());

    let input_path = matches.get_one::<std::ffi::OsString>("FILE").ok_or("Missing input")?;
    let output_path = DestPath::new(matches.get_one::<std::ffi::OsString>("output").ok_or("Missing output")?);

    let crop = match (matches.get_one::<String>("crop"), matches.get_one::<String>("crop-square")) {
        (Some(crop), _) => Some(parse_crop(crop).ok_or("Crop must be x,y,wxh, e.g. 10,20,100x50")?),
        (None, Some(square)) => Some(parse_square(square).ok_or("Square crop must be x,y,size, e.g. 0,0,100")?),
        (None, None) => None,
    };

    let defaults = Settings::default();
    let settings = Settings {
        crop,
        width: matches.get_one::<u32>("width").copied(),
        height: matches.get_one::<u32>("height").copied(),
        filter: match matches.get_one::<String>("filter").map(String::as_str) {
            Some("nearest") => Filter::Nearest,
            Some("triangle") => Filter::Triangle,
            Some("catrom") => Filter::CatmullRom,
            Some("mitchell") => Filter::Mitchell,
            _ => Filter::Lanczos3,
        },
        max_colors: matches.get_one::<u16>("colors").copied().unwrap_or(defaults.max_colors),
        threads: matches.get_one::<usize>("threads").copied().unwrap_or(defaults.threads),
        quantizer: match matches.get_one::<String>("quantizer").map(String::as_str) {
            Some("median-cut") => QuantizerKind::MedianCut,
            _ => QuantizerKind::Liq,
        },
        dithering: matches.get_one::<f32>("dither").copied().unwrap_or(defaults.dithering),
        fast: matches.get_flag("fast"),
    };
    settings.validate()?;

    let quiet = matches.get_flag("quiet") || output_path == DestPath::Stdout;
    if !quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let input: Box<dyn Read> = if input_path.as_os_str() == "-" {
        Box::new(io::stdin().lock())
    } else {
        let path = Path::new(input_path);
        Box::new(File::open(path).map_err(|e| format!("Can't read {}: {e}", path.display()))?)
    };
    let animation = gifcrop::decode(BufReader::new(input))?;

    let mut pb;
    let mut nopb = NoProgress {};
    let progress: &mut dyn ProgressReporter = if quiet {
        &mut nopb
    } else {
        pb = ProgressBar::new(animation.frames.len() as u64);
        pb.show_speed = false;
        pb.show_percent = false;
        pb.format(" #_. ");
        pb.message("Frame ");
        pb.set_max_refresh_rate(Some(Duration::from_millis(250)));
        &mut pb
    };

    let output = gifcrop::process(animation, &settings, progress)?;

    // only now, so that a failed run leaves no file behind
    match output_path {
        DestPath::Path(p) => {
            let file = File::create(p)
                .map_err(|e| format!("Can't write to {}: {e}", p.display()))?;
            let mut out = BufWriter::new(file);
            gifcrop::encode(&output, &mut out)?;
            out.flush()?;
        },
        DestPath::Stdout => {
            gifcrop::encode(&output, io::stdout().lock())?;
        },
    };
    progress.done(&format!("gifcrop created {output_path}"));

    Ok(())
}

/// `x,y,wxh`
fn parse_crop(s: &str) -> Option<Rect> {
    let mut parts = s.split(',');
    let x = parts.next()?.trim().parse().ok()?;
    let y = parts.next()?.trim().parse().ok()?;
    let (w, h) = parts.next()?.trim().split_once(|c| c == 'x' || c == '×')?;
    if parts.next().is_some() {
        return None;
    }
    Some(Rect::new(x, y, w.parse().ok()?, h.parse().ok()?))
}

/// `x,y,size`
fn parse_square(s: &str) -> Option<Rect> {
    let mut parts = s.split(',').map(|p| p.trim().parse().ok());
    let rect = Rect::square(parts.next()??, parts.next()??, parts.next()??);
    if parts.next().is_some() {
        return None;
    }
    Some(rect)
}

#[derive(PartialEq)]
enum DestPath<'a> {
    Path(&'a Path),
    Stdout,
}

impl<'a> DestPath<'a> {
    pub fn new(path: &'a OsStr) -> Self {
        if path == "-" {
            Self::Stdout
        } else {
            Self::Path(Path::new(path))
        }
    }
}

impl fmt::Display for DestPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Path(orig_path) => {
                let abs_path = dunce::canonicalize(orig_path);
                abs_path.as_ref().map(|p| p.as_path()).unwrap_or(orig_path).display().fmt(f)
            },
            Self::Stdout => f.write_str("stdout"),
        }
    }
}

#[test]
fn parses_crop_arguments() {
    assert_eq!(parse_crop("10,20,100x50"), Some(Rect::new(10, 20, 100, 50)));
    assert_eq!(parse_crop(" 1, 2, 3x4"), Some(Rect::new(1, 2, 3, 4)));
    assert_eq!(parse_crop("1,2,3"), None);
    assert_eq!(parse_crop("1,2,3x4,5"), None);
    assert_eq!(parse_square("0,0,100"), Some(Rect::square(0, 0, 100)));
    assert_eq!(parse_square("0,0"), None);
    assert_eq!(parse_square("0,0,-1"), None);
}
