use std::{env, fs, time::Duration};

use agrisafe_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("agrisafe.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081
body_limit_bytes = 4096

[database]
url = "postgres://agrisafe:secret@db:5432/agrisafe"
pool_size = 4

[logging]
level = "debug"

[mail]
host = "smtp.example.org"
from = "AgriSafe <no-reply@agrisafe.example>"

[auth.token]
secret = "0123456789abcdef0123456789abcdef"
issuer = "https://api.agrisafe.example"
ttl = "2h"

[auth.verification]
ttl = "30m"
link_base_url = "https://app.agrisafe.example/verify-email"

[auth.cookies]
secure = true
same_site = "strict"

[auth.oidc]
issuer = "https://login.example.org"
client_id = "agrisafe"
client_secret = "shh"
redirect_url = "https://api.agrisafe.example/auth/callback"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.server.body_limit_bytes, 4096);
    assert_eq!(cfg.database.pool_size, 4);
    assert_eq!(
        cfg.database.connection_url(),
        "postgres://agrisafe:secret@db:5432/agrisafe"
    );
    assert_eq!(cfg.logging.level, "debug");
    let mail = cfg.mail.as_ref().expect("mail section");
    assert_eq!(mail.port, 587);
    assert_eq!(cfg.auth.token.ttl, Duration::from_secs(7200));
    assert_eq!(cfg.auth.verification.ttl, Duration::from_secs(1800));
    assert!(cfg.auth.cookies.secure);
    assert_eq!(cfg.auth.cookies.session_name, "auth_token");
    let oidc = cfg.auth.oidc.as_ref().expect("oidc section");
    assert_eq!(oidc.scopes, vec!["openid", "profile", "email"]);
    assert_eq!(oidc.state_cookie_max_age, Duration::from_secs(600));

    // 2) Env override should win over file
    unsafe {
        env::set_var("AGRISAFE__SERVER__PORT", "9090");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9090);
    unsafe {
        env::remove_var("AGRISAFE__SERVER__PORT");
    }

    // 3) Short secret is rejected
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[auth.token]
secret = "too-short"
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("auth.token.secret"));

    // 4) Missing file falls back to defaults, which lack a secret
    let missing = dir.path().join("missing.toml");
    let err = load_config(missing.to_str()).expect_err("expected missing secret");
    assert!(err.contains("auth.token.secret"));
}
