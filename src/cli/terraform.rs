// Terraform apply/destroy against a patched directory
use crate::config::Config;
use crate::context::Context;
use crate::errors::Result;
use crate::terraform::{Terraform, TerraformOptions};
use colored::Colorize;
use std::path::Path;

fn terraform(config: &Config, dir: &Path, max_retries: Option<u32>) -> Result<Terraform> {
    let mut options = TerraformOptions::from_config(dir, &config.terraform)?;
    if let Some(retries) = max_retries {
        options.max_retries = retries;
    }
    Terraform::new(options)
}

pub fn apply(ctx: &Context, config: &Config, dir: &Path, max_retries: Option<u32>) -> Result<()> {
    let tf = terraform(config, dir, max_retries)?;
    println!("Applying {}...", dir.display());
    let stdout = tf.init_and_apply(ctx)?;
    print!("{}", stdout);
    println!("{} Apply complete", "✓".bright_green());
    Ok(())
}

pub fn destroy(ctx: &Context, config: &Config, dir: &Path, max_retries: Option<u32>) -> Result<()> {
    let tf = terraform(config, dir, max_retries)?;
    println!("Destroying {}...", dir.display());
    let stdout = tf.destroy(ctx)?;
    print!("{}", stdout);
    println!("{} Destroy complete", "✓".bright_green());
    Ok(())
}
