use super::{Session, exit_code};
use colored::Colorize;
use std::net::IpAddr;

pub async fn check(session: &Session, ip: IpAddr, host: &str) -> anyhow::Result<i32> {
    let ctx = session.context();

    match session.coordinator.check_ip(&ctx, ip, host).await {
        Ok(()) => {
            eprintln!("{}", format!("✓ {} is assigned to {}", ip, host).green().bold());
            Ok(0)
        }
        Err(e) => {
            eprintln!("{}", format!("✗ {}", e).red().bold());
            Ok(exit_code(&e))
        }
    }
}

pub async fn find_host(session: &Session, domain: &str) -> anyhow::Result<i32> {
    let ctx = session.context();

    match session.coordinator.find_host_for_new_ip(&ctx, domain).await {
        Ok(assignment) => {
            println!(
                "{}",
                serde_json::json!({ "host": assignment.host, "ip": assignment.ip })
            );
            Ok(0)
        }
        Err(e) => {
            eprintln!("{}", format!("✗ {}", e).red().bold());
            Ok(exit_code(&e))
        }
    }
}

pub async fn assign_cidr(session: &Session, host: &str) -> anyhow::Result<i32> {
    let ctx = session.context();

    match session.coordinator.assign_cidr(&ctx, host).await {
        Ok(()) => {
            eprintln!("{}", format!("✓ Failure domain ranges assigned to {}", host).green().bold());
            Ok(0)
        }
        Err(e) => {
            eprintln!("{}", format!("✗ {}", e).red().bold());
            Ok(exit_code(&e))
        }
    }
}
