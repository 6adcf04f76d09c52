//! 命令行参数

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "mcv-webhook", version, about = "Validating admission webhooks for managed clusters")]
pub struct Cli {
    /// 配置目录，包含 default.toml 与 <APP_ENV>.toml
    #[arg(long, env = "MCV_CONFIG_DIR", default_value = "config", global = true)]
    pub config_dir: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 启动 HTTP 服务
    Serve {
        /// 覆盖 server.port
        #[arg(long)]
        port: Option<u16>,
    },
    /// 输出 ValidatingWebhookConfiguration YAML
    Descriptors,
    /// 输出策略文档 JSON
    Docs,
    /// 构造全部策略并校验 URI 唯一性
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_with_port_override() {
        let cli = Cli::try_parse_from(["mcv-webhook", "--config-dir", "/etc/mcv", "serve", "--port", "6000"])
            .unwrap();
        assert_eq!(cli.config_dir, "/etc/mcv");
        assert!(matches!(cli.command, Command::Serve { port: Some(6000) }));
    }

    #[test]
    fn test_generator_subcommands() {
        let cli = Cli::try_parse_from(["mcv-webhook", "descriptors", "--config-dir", "cfg"]).unwrap();
        assert_eq!(cli.config_dir, "cfg");
        assert!(matches!(cli.command, Command::Descriptors));
        assert!(Cli::try_parse_from(["mcv-webhook", "docs"]).is_ok());
        assert!(Cli::try_parse_from(["mcv-webhook", "check"]).is_ok());
        assert!(Cli::try_parse_from(["mcv-webhook"]).is_err());
    }
}
