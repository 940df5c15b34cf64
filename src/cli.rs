use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "faucet-vision")]
#[command(about = "Draw detection-service results onto uploaded images", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Custom config file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase verbosity (-v, -vv)")]
    pub verbose: u8,

    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[arg(short, long, global = true, help = "Output directory")]
    pub output: Option<PathBuf>,

    #[arg(long, global = true, value_name = "FORMAT", help = "Output format (png|jpeg|webp)")]
    pub format: Option<ImageFormat>,

    #[arg(long, global = true, value_name = "QUALITY", help = "JPEG quality 1-100")]
    pub quality: Option<u8>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Draw the detections from a response onto an image")]
    Render {
        #[arg(long, help = "Path to the uploaded image")]
        image: PathBuf,

        #[arg(long, help = "Path to the detection response JSON")]
        response: PathBuf,
    },
    #[command(about = "Summarize what a detection response contains")]
    Inspect {
        #[arg(long, help = "Path to the detection response JSON")]
        response: PathBuf,

        #[arg(long, help = "Also print the full response tree")]
        raw: bool,
    },
    #[command(about = "Save the backend's pre-rendered visualization image")]
    Visualization {
        #[arg(long, help = "Path to the detection response JSON")]
        response: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl std::str::FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            "webp" => Ok(ImageFormat::Webp),
            _ => Err(format!(
                "Invalid image format '{}'. Must be one of: jpeg, png, webp",
                s
            )),
        }
    }
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(quality) = self.quality {
            if !(1..=100).contains(&quality) {
                return Err(format!(
                    "Quality must be between 1 and 100, got {}",
                    quality
                ));
            }
        }

        if self.verbose > 0 && self.quiet {
            return Err("Cannot specify both --verbose and --quiet".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("valid arguments")
    }

    #[test]
    fn render_command_parses() {
        let cli = parse(&[
            "faucet-vision",
            "render",
            "--image",
            "sink.jpg",
            "--response",
            "sink.json",
            "-o",
            "out",
            "--format",
            "jpg",
        ]);

        match &cli.command {
            Commands::Render { image, response } => {
                assert_eq!(image, &PathBuf::from("sink.jpg"));
                assert_eq!(response, &PathBuf::from("sink.json"));
            }
            other => panic!("Unexpected command: {:?}", other),
        }
        assert_eq!(cli.output, Some(PathBuf::from("out")));
        assert_eq!(cli.format, Some(ImageFormat::Jpeg));
    }

    #[test]
    fn inspect_raw_flag() {
        let cli = parse(&["faucet-vision", "-v", "inspect", "--response", "r.json", "--raw"]);
        assert!(matches!(cli.command, Commands::Inspect { raw: true, .. }));
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from([
            "faucet-vision",
            "visualization",
            "--response",
            "r.json",
            "--format",
            "tga"
        ])
        .is_err());
    }

    #[test]
    fn validate_rejects_conflicting_flags() {
        let cli = parse(&["faucet-vision", "-v", "-q", "inspect", "--response", "r.json"]);
        assert!(cli.validate().is_err());

        let cli = parse(&[
            "faucet-vision",
            "--quality",
            "0",
            "inspect",
            "--response",
            "r.json",
        ]);
        assert!(cli.validate().is_err());

        let cli = parse(&["faucet-vision", "inspect", "--response", "r.json"]);
        assert!(cli.validate().is_ok());
    }
}
