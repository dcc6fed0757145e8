use clap::{Parser, Subcommand};
use consult_core::{
    Actor, CoreConfig, IdentityCorrelator, KnowledgeIndex, PermissionEvaluator, RelationType,
};
use consult_wire::KnowledgeSeed;

#[derive(Parser)]
#[command(name = "consult")]
#[command(about = "Collaborative diagnosis workflow CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the correlation key for a patient identifier or disease concept
    Hash {
        /// Raw subject text
        value: String,
    },
    /// Summarise a JSON file of raw knowledge records
    Index {
        /// Path to a JSON array of raw records
        file: String,
        /// Evaluate access for this organisation (no shares applied)
        #[arg(long)]
        organisation: Option<String>,
        /// Group fragments by owning organisation instead of by relation type
        #[arg(long)]
        by_organisation: bool,
    },
    /// List the known relation types
    Relations,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Hash { value }) => {
            let key = IdentityCorrelator::hash(&value);
            if key.is_empty() {
                eprintln!("Subject is empty: no correlation key can be derived");
            } else {
                println!("{}", key);
            }
        }
        Some(Commands::Index {
            file,
            organisation,
            by_organisation,
        }) => {
            let text = std::fs::read_to_string(&file)?;
            let records = KnowledgeSeed::parse_records(&text)?;
            let index = KnowledgeIndex::build(&records, &CoreConfig::default());

            if by_organisation {
                for (owner, triples) in index.by_organisation() {
                    println!("{} ({} fragments)", owner, triples.len());
                    for t in triples {
                        println!("  {} -[{}]-> {}", t.head, t.relation.display_name(), t.tail);
                    }
                }
            } else if let Some(organisation) = organisation {
                let actor = Actor::new("cli", &organisation)?;
                let evaluated = PermissionEvaluator::evaluate(&index, actor.organisation(), &[]);
                for summary in evaluated.summaries() {
                    match evaluated.view(summary.relation, actor.organisation()) {
                        Ok(view) => println!(
                            "{} [{}]: {} visible of {}",
                            summary.relation.display_name(),
                            summary.relation,
                            view.records.len(),
                            summary.count
                        ),
                        Err(e) => println!(
                            "{} [{}]: locked ({})",
                            summary.relation.display_name(),
                            summary.relation,
                            e
                        ),
                    }
                }
            } else {
                for summary in index.summaries() {
                    let owners: Vec<&str> =
                        summary.organisations.iter().map(String::as_str).collect();
                    println!(
                        "{} [{}]: {} fragments from {}",
                        summary.relation.display_name(),
                        summary.relation,
                        summary.count,
                        owners.join(", ")
                    );
                }
            }

            if index.skipped() > 0 {
                eprintln!("Skipped {} undecodable records", index.skipped());
            }
        }
        Some(Commands::Relations) => {
            for relation in RelationType::ALL {
                println!("{}\t{}", relation.tag(), relation.display_name());
            }
        }
        None => {
            println!("Use 'consult --help' for commands");
        }
    }

    Ok(())
}
