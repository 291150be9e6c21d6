//! COVID-19 Chest X-Ray Detection CLI
//!
//! Entry point for the offline training flow and one-shot classification
//! and reporting from the command line.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;
use walkdir::WalkDir;

use covid_xray::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use covid_xray::dataset::{extract_archive, AugmentationConfig, XrayDataset};
use covid_xray::inference::{classify, BurnClassifier, Classifier, Label, Preprocessor};
use covid_xray::report::{ReportGenerator, DEFAULT_ATTRIBUTION};
use covid_xray::session::{Age, Gender, PatientInfo, SessionContext};
use covid_xray::training::{run_training, TrainingConfig};
use covid_xray::utils::format_progress_bar;
use covid_xray::utils::logging::{init_logging, LogConfig};

/// COVID-19 Chest X-Ray Detection
///
/// Trains a small CNN on a labeled chest X-ray dataset and classifies new
/// images as COVID positive or negative, with optional PDF reports.
#[derive(Parser, Debug)]
#[command(name = "covid_xray")]
#[command(version)]
#[command(about = "Chest X-ray COVID-19 classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Unpack the zipped dataset
    Extract {
        /// Path to the dataset archive
        #[arg(short, long, default_value = "CovidDataset.zip")]
        archive: PathBuf,

        /// Directory to extract into
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Train the classifier
    Train {
        /// Dataset root with Train/ and Val/ directories
        #[arg(short, long, default_value = "CovidDataset")]
        data_dir: PathBuf,

        /// Number of training epochs
        #[arg(short, long, default_value = "20")]
        epochs: usize,

        /// Batch size for training and validation
        #[arg(short, long, default_value = "32")]
        batch_size: usize,

        /// Adam learning rate
        #[arg(short, long, default_value = "0.001")]
        learning_rate: f64,

        /// Training batches per epoch (0 = full pass)
        #[arg(long, default_value = "7")]
        steps_per_epoch: usize,

        /// Validation batches per epoch (0 = full pass)
        #[arg(long, default_value = "1")]
        validation_steps: usize,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output directory for the model, its config and the history
        #[arg(short, long, default_value = "output/models")]
        output_dir: PathBuf,

        /// Disable shear, zoom and flip augmentation
        #[arg(long, default_value = "false")]
        no_augmentation: bool,
    },

    /// Classify an image or every image in a directory
    Predict {
        /// Path to input image or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Path to trained model
        #[arg(short, long, default_value = "output/models/covid_model")]
        model: PathBuf,
    },

    /// Classify one image and write a PDF report
    Report {
        /// Chest X-ray image (JPEG or PNG)
        #[arg(short, long)]
        image: PathBuf,

        /// Path to trained model
        #[arg(short, long, default_value = "output/models/covid_model")]
        model: PathBuf,

        /// Patient name
        #[arg(long)]
        name: String,

        /// Patient age (1-120)
        #[arg(long)]
        age: u32,

        /// Patient gender (Male, Female, Other)
        #[arg(long)]
        gender: String,

        /// Directory for the report
        #[arg(short, long, default_value = "reports")]
        output_dir: PathBuf,

        /// Attribution line printed on the report
        #[arg(long, default_value = DEFAULT_ATTRIBUTION)]
        attribution: String,
    },

    /// Show dataset statistics
    Stats {
        /// Dataset root with Train/ and Val/ directories
        #[arg(short, long, default_value = "CovidDataset")]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };

    let _ = init_logging(&log_config);

    print_banner();

    match cli.command {
        Commands::Extract {
            archive,
            output_dir,
        } => cmd_extract(&archive, &output_dir)?,

        Commands::Train {
            data_dir,
            epochs,
            batch_size,
            learning_rate,
            steps_per_epoch,
            validation_steps,
            seed,
            output_dir,
            no_augmentation,
        } => {
            let config = TrainingConfig {
                data_dir,
                output_dir,
                epochs,
                batch_size,
                learning_rate,
                steps_per_epoch: (steps_per_epoch > 0).then_some(steps_per_epoch),
                validation_steps: (validation_steps > 0).then_some(validation_steps),
                seed,
                augmentation: (!no_augmentation).then(AugmentationConfig::default),
                ..TrainingConfig::default()
            };
            println!("  Backend: {}", backend_name());
            run_training::<TrainingBackend>(&config)?;
        }

        Commands::Predict { input, model } => cmd_predict(&input, &model)?,

        Commands::Report {
            image,
            model,
            name,
            age,
            gender,
            output_dir,
            attribution,
        } => {
            let patient = PatientInfo::new(name, Age::new(age)?, gender.parse::<Gender>()?);
            let generator = ReportGenerator::new(output_dir).with_attribution(attribution);
            cmd_report(&image, &model, &patient, &generator)?;
        }

        Commands::Stats { data_dir } => cmd_stats(&data_dir)?,
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════════╗
 ║   🩻 COVID-19 Chest X-Ray Detection                      ║
 ║   Binary CNN classifier with Burn + Rust                 ║
 ╚══════════════════════════════════════════════════════════╝
  "#
        .green()
    );
}

fn load_classifier(model: &Path) -> Result<BurnClassifier<DefaultBackend>> {
    println!("{}", format!("Loading model from {:?}...", model).cyan());
    Ok(BurnClassifier::<DefaultBackend>::load(model, &default_device())?)
}

fn cmd_extract(archive: &Path, output_dir: &Path) -> Result<()> {
    let summary = extract_archive(archive, output_dir)?;

    println!("{}", "Extraction Complete!".green().bold());
    println!("  📦 Files:       {}", summary.files);
    println!("  📁 Directories: {}", summary.directories);
    println!("  📍 Location:    {:?}", output_dir);
    Ok(())
}

fn cmd_predict(input: &Path, model: &Path) -> Result<()> {
    let classifier = load_classifier(model)?;
    let preprocessor = Preprocessor::with_image_size(classifier.input_size() as u32);

    let images: Vec<PathBuf> = if input.is_dir() {
        let mut paths: Vec<PathBuf> = WalkDir::new(input)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| covid_xray::dataset::loader::is_image_file(p))
            .collect();
        paths.sort();
        paths
    } else {
        vec![input.to_path_buf()]
    };

    if images.is_empty() {
        println!("{} No images found in {:?}", "Error:".red(), input);
        return Ok(());
    }

    info!("Classifying {} image(s)", images.len());
    println!();

    let mut positives = 0usize;
    for path in &images {
        let result = preprocessor
            .preprocess_file(path)
            .and_then(|tensor| classify(&classifier, &tensor));

        match result {
            Ok(verdict) => {
                let label = match verdict.label() {
                    Label::Positive => {
                        positives += 1;
                        verdict.label().to_string().red().bold()
                    }
                    Label::Negative => verdict.label().to_string().green().bold(),
                };
                println!("  {:?}", path);
                println!(
                    "    {} {}",
                    label,
                    format_progress_bar(verdict.confidence().percent() / 100.0, 30)
                );
            }
            Err(e) => println!("  {:?}\n    {} {}", path, "Error:".red(), e),
        }
    }

    if images.len() > 1 {
        println!();
        println!(
            "{} {} positive / {} total",
            "Summary:".cyan().bold(),
            positives,
            images.len()
        );
    }

    Ok(())
}

fn cmd_report(
    image: &Path,
    model: &Path,
    patient: &PatientInfo,
    generator: &ReportGenerator,
) -> Result<()> {
    patient.validate()?;
    let classifier = load_classifier(model)?;

    let mut session =
        SessionContext::new(Preprocessor::with_image_size(classifier.input_size() as u32));
    let bytes = std::fs::read(image)?;
    session.upload_image(&bytes, image.file_name().and_then(|n| n.to_str()))?;

    let verdict = session.analyze(&classifier)?;
    let record = session.generate_report(patient, generator)?;

    println!();
    println!("{}", "Analysis Result:".cyan().bold());
    if verdict.is_emergency() {
        println!("  🚨 {}", verdict.label().to_string().red().bold());
        println!(
            "  {}",
            "Immediate hospital admission recommended.".red()
        );
    } else {
        println!("  ✅ {}", verdict.label().to_string().green().bold());
    }
    println!("  Confidence: {}", verdict.confidence());
    println!();
    println!("{}", "📄 PDF Report Generated".green().bold());
    println!("  Patient: {} ({}, {})", record.name(), record.age(), record.gender());
    println!("  Time:    {}", record.timestamp());
    println!("  File:    {:?}", record.path());

    Ok(())
}

fn cmd_stats(data_dir: &Path) -> Result<()> {
    info!("Computing dataset statistics for: {:?}", data_dir);

    if !data_dir.exists() {
        println!(
            "{} Dataset directory not found: {:?}",
            "Error:".red(),
            data_dir
        );
        println!();
        println!("Extract the dataset archive first:");
        println!("  covid_xray extract --archive CovidDataset.zip");
        return Ok(());
    }

    for (title, split) in [("Train", data_dir.join("Train")), ("Val", data_dir.join("Val"))] {
        match XrayDataset::new(&split) {
            Ok(dataset) => dataset.stats().print(title),
            Err(e) => println!("{} {}: {}", "Error:".red(), title, e),
        }
    }

    Ok(())
}
