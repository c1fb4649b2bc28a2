use super::QueryArgs;
use anyhow::Result;
use colored::Colorize;
use disa_patch::{CertificateIdentity, FileRecord, Portal};
use futures::StreamExt;

pub async fn list(
    portal: &Portal,
    args: &QueryArgs,
    identity: Option<CertificateIdentity>,
    json: bool,
) -> Result<()> {
    super::connect(portal, &args.repository, identity).await?;

    let query = args.query();
    let files = portal.files(&query).await?;
    futures::pin_mut!(files);

    let mut count = 0usize;
    while let Some(file) = files.next().await {
        count += 1;
        if json {
            println!("{}", serde_json::to_string(&file)?);
        } else {
            print_record(&file);
        }
    }

    if !json {
        if count == 0 {
            println!("{} No files found", "✗".red());
        } else {
            println!("\n{} {} files", "✓".green(), count.to_string().bold());
        }
    }

    Ok(())
}

fn print_record(file: &FileRecord) {
    println!("{}", file.title.bold());
    print!("  {}", file.filename.cyan());
    print!(" {}", format!("({:.2} MB)", file.size_mb).dimmed());
    if let Some(arch) = &file.architecture {
        print!(" {}", arch.to_string().yellow());
    }
    println!();

    let mut facts = Vec::new();
    if let Some(product) = &file.product {
        facts.push(product.clone());
    }
    if let Some(kb) = &file.kb {
        facts.push(format!("KB{}", kb));
    }
    if !file.posted_date.is_empty() {
        facts.push(format!("posted {}", file.posted_date));
    }
    if !facts.is_empty() {
        println!("  {}", facts.join(" · ").dimmed());
    }
}
