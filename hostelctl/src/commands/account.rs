use std::path::PathBuf;

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Args;
use pass_engine::directory::seed_directory;
use passes::auth::Session;
use passes::directory::Directory;
use passes::Role;

use super::Context;

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// YAML file with `students`, `warden` and `hod` tables
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(value_name = "USERNAME")]
    pub username: String,
    #[arg(long, env = "HOSTEL_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn seed(ctx: &Context, args: SeedArgs) -> Result<()> {
    let directory = Directory::from_yaml_file(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    directory.validate()?;
    let store = ctx.open_store().await?;
    let written = seed_directory(&*store, &directory).await?;
    println!("Seeded {} users", written);
    Ok(())
}

pub async fn login(ctx: &Context, args: LoginArgs) -> Result<()> {
    let service = ctx.service().await?;
    let session = service.login(&args.username, &args.password, Utc::now())?;
    session.save(ctx.session_path())?;
    println!("Logged in as {} ({})", session.user.id, session.role());
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<()> {
    Session::clear(ctx.session_path())?;
    println!("Logged out");
    Ok(())
}

pub fn whoami(ctx: &Context) -> Result<()> {
    let session = ctx.session()?;
    let user = &session.user;
    println!("{} ({})", user.id, user.role);
    if !user.name.is_empty() {
        println!("name: {}", user.name);
    }
    if let Some(department) = &user.department {
        println!("department: {}", department);
    }
    if user.role == Role::Hod {
        let config = passes::config::load_from_env()?;
        let departments = config.departments.departments_of(&user.id);
        if !departments.is_empty() {
            println!("departments: {}", departments.join(", "));
        }
    }
    if let Some(block) = &user.block {
        println!("block: {}", block);
    }
    Ok(())
}
