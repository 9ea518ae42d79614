use super::{Session, exit_code, print_status};
use colored::Colorize;
use std::net::IpAddr;

pub async fn add_random(session: &Session, host: &str, domain: &str) -> anyhow::Result<i32> {
    eprintln!("{}", format!("Adding a random egress ip to {}...", host).blue());
    let ctx = session.context();

    match session.coordinator.add_random_ip(&ctx, host, domain).await {
        Ok(ip) => {
            eprintln!("{}", format!("✓ {} provisioned on {}", ip, host).green().bold());
            print_status(&session.reporter.provisioned(&session.namespace, domain, ip, host))?;
            Ok(0)
        }
        Err(e) => {
            let status = session
                .reporter
                .failed(&session.namespace, domain, None, Some(host), &e);
            report_failure(&e);
            print_status(&status)?;
            Ok(exit_code(&e))
        }
    }
}

pub async fn add(session: &Session, ip: IpAddr, host: &str, domain: &str) -> anyhow::Result<i32> {
    eprintln!("{}", format!("Adding {} to {}...", ip, host).blue());
    let ctx = session.context();

    match session.coordinator.add_specified_ip(&ctx, ip, host).await {
        Ok(()) => {
            eprintln!("{}", format!("✓ {} provisioned on {}", ip, host).green().bold());
            print_status(&session.reporter.provisioned(&session.namespace, domain, ip, host))?;
            Ok(0)
        }
        Err(e) => failed(session, domain, ip, host, &e),
    }
}

pub async fn relocate(
    session: &Session,
    ip: IpAddr,
    from: &str,
    to: &str,
    domain: &str,
) -> anyhow::Result<i32> {
    eprintln!("{}", format!("Moving {} from {} to {}...", ip, from, to).blue());
    let ctx = session.context();

    match session.coordinator.move_ip(&ctx, ip, from, to).await {
        Ok(()) => {
            eprintln!("{}", format!("✓ {} moved to {}", ip, to).green().bold());
            print_status(&session.reporter.provisioned(&session.namespace, domain, ip, to))?;
            Ok(0)
        }
        Err(e) => failed(session, domain, ip, from, &e),
    }
}

pub async fn remove(session: &Session, ip: IpAddr, host: &str, domain: &str) -> anyhow::Result<i32> {
    eprintln!("{}", format!("Removing {} from {}...", ip, host).blue());
    let ctx = session.context();

    match session.coordinator.remove_ip(&ctx, ip, host).await {
        Ok(()) => {
            eprintln!("{}", format!("✓ {} released from {}", ip, host).green().bold());
            print_status(&session.reporter.deprovisioned(&session.namespace, domain, ip, host))?;
            Ok(0)
        }
        Err(e) => failed(session, domain, ip, host, &e),
    }
}

fn failed(
    session: &Session,
    domain: &str,
    ip: IpAddr,
    host: &str,
    error: &egressip_core::EgressIpError,
) -> anyhow::Result<i32> {
    let status = session
        .reporter
        .failed(&session.namespace, domain, Some(ip), Some(host), error);
    report_failure(error);
    print_status(&status)?;
    Ok(exit_code(error))
}

fn report_failure(error: &egressip_core::EgressIpError) {
    eprintln!();
    if error.is_fatal() {
        eprintln!("{}", "✗ Cloud and cluster are out of sync".red().bold());
        eprintln!("  {}", error);
        eprintln!();
        eprintln!("Reconcile the address by hand before retrying.");
    } else {
        eprintln!("{}", format!("✗ Failed ({})", error.kind()).red().bold());
        eprintln!("  {}", error);
    }
}
