mod artifacts;
mod models;
mod scorer;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use models::{BundleSource, Config, ScoredLead, Tier};
use scorer::{BatchResult, LeadScorer};
use std::fs;
use std::path::Path;

const SCORED_CSV_PREFIX: &str = "Lead_Scoring_Results_";

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("lead-scorer")
        .version("1.0")
        .about("Scores lead conversion likelihood using a pre-trained classifier")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("input")
                .value_name("CSV")
                .help("Lead CSV file to score")
                .required_unless_present("sample"),
        )
        .arg(
            Arg::new("sample")
                .long("sample")
                .action(ArgAction::SetTrue)
                .help("Write a sample CSV template and exit"),
        )
        .get_matches();

    if matches.get_flag("sample") {
        let template_path = "sample_leads_template.csv";
        write_sample_template(template_path)?;
        println!("📥 Sample template written to: {}", template_path);
        return Ok(());
    }

    let config_file = matches.get_one::<String>("config").unwrap();
    let input_file = matches.get_one::<String>("input").unwrap();

    // Load or create configuration
    let config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        let default_config = Config::default();
        default_config.save_to_file(config_file)?;
        println!("⚠️  Please edit {} and point it at your model bundle, then run the program again.", config_file);
        return Ok(());
    };

    let output_dir = config.output_directory.as_deref().unwrap_or("output");

    // Create output directory if it doesn't exist
    fs::create_dir_all(output_dir)?;

    // Clean up previous results
    clean_output_directory(output_dir)?;

    // Load the training artifacts; without them the app cannot serve predictions
    println!("🔄 Loading model bundle...");
    let loader = artifacts::BundleLoader::new();
    let bundle = match config.bundle_source {
        BundleSource::Local => {
            let bundle_path = config.model_bundle_path.as_deref().unwrap_or("");
            if bundle_path.is_empty() {
                println!("❌ Error: model_bundle_path is empty in configuration file");
                println!("   Please edit {} and set the model bundle path", config_file);
                return Ok(());
            }
            println!("📦 Reading model bundle from: {}", bundle_path);
            loader.load_file(bundle_path)?
        }
        BundleSource::Remote => {
            let bundle_url = config.model_bundle_url.as_deref().unwrap_or("");
            if bundle_url.is_empty() {
                println!("❌ Error: model_bundle_url is empty in configuration file");
                println!("   Please edit {} and set the model bundle URL", config_file);
                return Ok(());
            }
            loader.fetch_url(bundle_url).await?
        }
    };
    println!("✅ Model bundle loaded ({} features)", bundle.encoders.len());

    println!("📂 Scoring leads from: {}", input_file);
    println!("📄 Output directory: {} (cleaned)", output_dir);
    println!("🎯 Required columns: {}", bundle.required_columns().join(", "));

    // Read the uploaded leads
    let (headers, rows) = read_leads_csv(input_file)?;
    println!("📄 Found {} leads with {} columns", rows.len(), headers.len());

    // Reject the upload if required columns are missing
    let lead_scorer = LeadScorer::new(&bundle);
    let missing = lead_scorer.missing_columns(&headers);
    if !missing.is_empty() {
        println!("❌ Missing required columns: {}", missing.join(", "));
        println!("   Your CSV must have these columns: {}", bundle.required_columns().join(", "));
        return Ok(());
    }

    if headers.iter().any(|h| h == "Converted") {
        println!("ℹ️  Note: 'Converted' column found and will be ignored for prediction");
    }

    // Score the batch
    println!("\n⚙️  Encoding, scaling and scoring {} leads...", rows.len());
    let result = lead_scorer.score_batch(&headers, &rows);

    if result.summary.unseen_substitutions > 0 {
        println!(
            "⚠️  {} value(s) were unseen at training time and mapped to default codes",
            result.summary.unseen_substitutions
        );
    }

    // Generate reports
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let scored_csv_path = Path::new(output_dir).join(format!("{}{}.csv", SCORED_CSV_PREFIX, timestamp));
    write_scored_csv(&headers, &result.leads, &scored_csv_path)?;
    generate_tier_csvs(&headers, &result.leads, output_dir)?;
    generate_summary_report(&bundle, &headers, &result, output_dir)?;

    print_summary(&bundle, &headers, &result);

    println!("\n✅ Scoring complete!");
    println!("📂 Scored leads: {}", scored_csv_path.display());
    println!("📂 Tier breakdown: {}/tiers", output_dir);
    println!("📂 Summary report: {}/score_summary.txt", output_dir);
    Ok(())
}

/// Read an uploaded lead CSV into headers plus raw string rows
fn read_leads_csv(file_path: &str) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::Reader::from_path(file_path)
        .with_context(|| format!("Failed to read CSV file: {}", file_path))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read CSV headers from: {}", file_path))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Malformed CSV row in: {}", file_path))?;
        rows.push(record.iter().map(|v| v.to_string()).collect());
    }

    Ok((headers, rows))
}

fn scored_headers(headers: &[String]) -> Vec<String> {
    let mut out: Vec<String> = headers.to_vec();
    out.push("Lead_Score".to_string());
    out.push("Lead_Score_%".to_string());
    out.push("Priority".to_string());
    out.push("Prediction".to_string());
    out
}

fn scored_row(lead: &ScoredLead) -> Vec<String> {
    let mut row = lead.record.clone();
    row.push(format!("{:.6}", lead.probability));
    row.push(format!("{:.2}", lead.score_percent()));
    row.push(lead.tier.as_str().to_string());
    row.push(lead.prediction_label().to_string());
    row
}

/// Export the scored leads: original columns plus score, tier and prediction
fn write_scored_csv(headers: &[String], leads: &[ScoredLead], csv_path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(csv_path)
        .with_context(|| format!("Failed to create scored CSV: {}", csv_path.display()))?;

    writer.write_record(&scored_headers(headers))?;
    for lead in leads {
        writer.write_record(&scored_row(lead))?;
    }

    writer.flush()?;
    Ok(())
}

/// Split the scored leads into one CSV per priority tier
fn generate_tier_csvs(headers: &[String], leads: &[ScoredLead], output_dir: &str) -> Result<()> {
    let tiers_dir = Path::new(output_dir).join("tiers");
    fs::create_dir_all(&tiers_dir)?;

    for (tier, file_name) in [
        (Tier::High, "high_priority.csv"),
        (Tier::Medium, "medium_priority.csv"),
        (Tier::Low, "low_priority.csv"),
    ] {
        let mut writer = csv::Writer::from_path(tiers_dir.join(file_name))?;
        writer.write_record(&scored_headers(headers))?;
        for lead in leads.iter().filter(|l| l.tier == tier) {
            writer.write_record(&scored_row(lead))?;
        }
        writer.flush()?;
    }

    Ok(())
}

/// One line of lead identity for reports: the model's input fields
fn lead_identity(bundle: &artifacts::ModelBundle, headers: &[String], lead: &ScoredLead) -> String {
    bundle
        .required_columns()
        .iter()
        .map(|col| {
            headers
                .iter()
                .position(|h| h == col)
                .and_then(|i| lead.record.get(i))
                .map(|v| v.as_str())
                .unwrap_or("-")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn generate_summary_report(
    bundle: &artifacts::ModelBundle,
    headers: &[String],
    result: &BatchResult,
    output_dir: &str,
) -> Result<()> {
    let summary = &result.summary;
    let mut content = String::new();
    content.push_str("Lead Scoring Summary\n");
    content.push_str("====================\n\n");

    content.push_str(&format!("Total leads scored: {}\n", summary.total_leads));
    content.push_str(&format!(
        "High priority (>= 70%): {} ({:.1}% of total)\n",
        summary.high_count,
        summary.tier_percent(summary.high_count)
    ));
    content.push_str(&format!(
        "Medium priority (40-70%): {} ({:.1}% of total)\n",
        summary.medium_count,
        summary.tier_percent(summary.medium_count)
    ));
    content.push_str(&format!(
        "Low priority (< 40%): {} ({:.1}% of total)\n",
        summary.low_count,
        summary.tier_percent(summary.low_count)
    ));
    content.push_str(&format!("Average score: {:.1}%\n", summary.average_score_percent));
    content.push_str(&format!(
        "Unseen category substitutions: {}\n\n",
        summary.unseen_substitutions
    ));

    content.push_str("Top 10 leads:\n");
    for (i, lead) in result.leads.iter().take(10).enumerate() {
        content.push_str(&format!(
            "   {}. {:.2}% | {} | {}\n",
            i + 1,
            lead.score_percent(),
            lead.tier.as_str(),
            lead_identity(bundle, headers, lead)
        ));
    }

    fs::write(Path::new(output_dir).join("score_summary.txt"), content)?;
    Ok(())
}

fn print_summary(bundle: &artifacts::ModelBundle, headers: &[String], result: &BatchResult) {
    let summary = &result.summary;

    println!("\n📊 SUMMARY");
    println!("==========\n");

    println!(
        "🟢 High priority leads:   {} ({:.1}% of total)",
        summary.high_count,
        summary.tier_percent(summary.high_count)
    );
    println!(
        "🟡 Medium priority leads: {} ({:.1}% of total)",
        summary.medium_count,
        summary.tier_percent(summary.medium_count)
    );
    println!(
        "🔴 Low priority leads:    {} ({:.1}% of total)",
        summary.low_count,
        summary.tier_percent(summary.low_count)
    );
    println!("📊 Average score: {:.1}%", summary.average_score_percent);

    println!("\n🏆 Top 10 leads:");
    for (i, lead) in result.leads.iter().take(10).enumerate() {
        println!(
            "   {}. {:.2}% | {} | {}",
            i + 1,
            lead.score_percent(),
            lead.tier.as_str(),
            lead_identity(bundle, headers, lead)
        );
    }
}

/// Write a sample CSV with the required columns and plausible values
fn write_sample_template(file_path: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)
        .with_context(|| format!("Failed to create sample template: {}", file_path))?;

    writer.write_record([
        "Email_Source",
        "Contacted",
        "Location",
        "Profession",
        "Course_Interest",
    ])?;
    for row in [
        ["Google", "Yes", "Mumbai", "Student", "Data Science"],
        ["Facebook", "No", "Delhi", "Working Professional", "Web Development"],
        ["Direct", "Yes", "Bangalore", "Unemployed", "AI/ML"],
        ["Referral", "No", "Chennai", "Freelancer", "Digital Marketing"],
        ["LinkedIn", "Yes", "Pune", "Student", "Cloud Computing"],
    ] {
        writer.write_record(row)?;
    }

    writer.flush()?;
    Ok(())
}

// Clean up previous results from output directory
fn clean_output_directory(output_dir: &str) -> Result<()> {
    let output_path = Path::new(output_dir);

    if !output_path.exists() {
        return Ok(());
    }

    println!("🧹 Cleaning previous results...");

    for entry in fs::read_dir(output_path)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if path.is_file() && (name.starts_with(SCORED_CSV_PREFIX) || name == "score_summary.txt") {
            fs::remove_file(&path)?;
            println!("   🗑️  Removed file: {}", name);
        } else if path.is_dir() && name == "tiers" {
            fs::remove_dir_all(&path)?;
            println!("   🗑️  Removed directory: {}", name);
        }
    }

    println!("   ✅ Output directory cleaned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{Classifier, FieldEncoder, ModelBundle, Scaler};

    fn test_bundle() -> ModelBundle {
        let bundle = ModelBundle {
            model: Classifier::LogisticRegression {
                weights: vec![2.0, 2.0],
                intercept: -2.0,
            },
            scaler: Scaler {
                mean: vec![0.0, 0.0],
                scale: vec![1.0, 1.0],
            },
            encoders: vec![
                FieldEncoder {
                    field: "Email_Source".to_string(),
                    classes: vec!["Direct".to_string(), "Google".to_string()],
                    fallback_index: 0,
                },
                FieldEncoder {
                    field: "Contacted".to_string(),
                    classes: vec!["No".to_string(), "Yes".to_string()],
                    fallback_index: 0,
                },
            ],
        };
        bundle.validate().unwrap();
        bundle
    }

    #[test]
    fn scored_csv_round_trip_preserves_rows_and_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("leads.csv");
        fs::write(
            &input_path,
            "Name,Email_Source,Contacted\n\
             Alice,Google,Yes\n\
             Bob,Direct,No\n\
             Carol,Google,No\n",
        )
        .unwrap();

        let bundle = test_bundle();
        let lead_scorer = LeadScorer::new(&bundle);

        let (headers, rows) = read_leads_csv(input_path.to_str().unwrap()).unwrap();
        assert!(lead_scorer.missing_columns(&headers).is_empty());
        let result = lead_scorer.score_batch(&headers, &rows);

        let scored_path = dir.path().join("scored.csv");
        write_scored_csv(&headers, &result.leads, &scored_path).unwrap();

        // Re-import the export: same row count, same tiers when re-scored
        let (exported_headers, scored_rows) = read_leads_csv(scored_path.to_str().unwrap()).unwrap();
        assert_eq!(scored_rows.len(), rows.len());

        assert!(lead_scorer.missing_columns(&exported_headers).is_empty());
        let rescored = lead_scorer.score_batch(&exported_headers, &scored_rows);

        let priority_index = exported_headers.iter().position(|h| h == "Priority").unwrap();
        for (exported, rescored_lead) in scored_rows.iter().zip(rescored.leads.iter()) {
            let exported_tier = Tier::parse(&exported[priority_index]).unwrap();
            // Exported rows are already sorted, so re-scoring keeps their order
            assert_eq!(exported_tier, rescored_lead.tier);
        }
    }

    #[test]
    fn missing_required_column_rejects_the_upload() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("leads.csv");
        fs::write(&input_path, "Name,Email_Source\nAlice,Google\n").unwrap();

        let bundle = test_bundle();
        let lead_scorer = LeadScorer::new(&bundle);

        let (headers, _) = read_leads_csv(input_path.to_str().unwrap()).unwrap();
        let missing = lead_scorer.missing_columns(&headers);
        assert_eq!(missing, vec!["Contacted".to_string()]);
    }

    #[test]
    fn sample_template_has_all_required_columns() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("sample.csv");
        write_sample_template(template_path.to_str().unwrap()).unwrap();

        let (headers, rows) = read_leads_csv(template_path.to_str().unwrap()).unwrap();
        assert_eq!(rows.len(), 5);
        for col in [
            "Email_Source",
            "Contacted",
            "Location",
            "Profession",
            "Course_Interest",
        ] {
            assert!(headers.iter().any(|h| h == col), "missing column {}", col);
        }
    }

    #[test]
    fn tier_csvs_partition_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = test_bundle();
        let lead_scorer = LeadScorer::new(&bundle);

        let headers = vec!["Email_Source".to_string(), "Contacted".to_string()];
        let rows = vec![
            vec!["Google".to_string(), "Yes".to_string()],
            vec!["Google".to_string(), "No".to_string()],
            vec!["Direct".to_string(), "No".to_string()],
        ];
        let result = lead_scorer.score_batch(&headers, &rows);

        let output_dir = dir.path().to_str().unwrap();
        generate_tier_csvs(&headers, &result.leads, output_dir).unwrap();

        let mut total = 0;
        for file_name in ["high_priority.csv", "medium_priority.csv", "low_priority.csv"] {
            let path = dir.path().join("tiers").join(file_name);
            let (_, tier_rows) = read_leads_csv(path.to_str().unwrap()).unwrap();
            total += tier_rows.len();
        }
        assert_eq!(total, rows.len());
    }
}
