use colored::Colorize;
use disa_patch::Repository;

pub fn repositories() {
    println!("{}", "==> Repositories".bold().green());
    for repo in Repository::ALL {
        println!("  {:<30} {}", repo.name().bold(), repo.id().to_string().dimmed());
    }
}
