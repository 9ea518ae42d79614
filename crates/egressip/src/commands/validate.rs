use colored::Colorize;
use egressip_config::{CloudConfig, EgressIpConfig, ProvisionerConfig};

pub fn handle(config: &EgressIpConfig) {
    println!("{}", "✓ Configuration is valid".green().bold());
    println!();

    match &config.provisioner {
        Some(ProvisionerConfig::Cloud {
            cloud:
                CloudConfig::Aws {
                    failure_region,
                    max_ips_per_instance,
                },
        }) => println!(
            "  provisioner: {} (aws, region {}, max {} ips per instance)",
            "cloud".cyan(),
            failure_region,
            max_ips_per_instance
        ),
        Some(other) => println!("  provisioner: {}", other.name().cyan()),
        None => println!("  provisioner: {}", "(not set)".yellow()),
    }

    println!("  state file: {}", config.state_file.display());
    println!("  failure domains: {}", config.failure_domains.len());
    for domain in &config.failure_domains {
        let cidr = domain
            .cidr
            .map(|c| c.to_string())
            .unwrap_or_else(|| "(no cidr)".to_string());
        println!("    - {} ({})", domain.name.cyan(), cidr);
    }
}
