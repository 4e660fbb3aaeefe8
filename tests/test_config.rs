use hearth::config::Config;

#[test]
fn test_config_defaults() {
    unsafe {
        std::env::remove_var("HEARTH_CONFIG");
        std::env::remove_var("LISTEN");
        std::env::remove_var("WORKER_THREADS");
    }
    let cfg = Config::load();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.server.worker_threads, 4);
}

#[test]
fn test_config_from_yaml() {
    let cfg =
        Config::from_yaml("server:\n  listen_addr: \"0.0.0.0:9000\"\n  worker_threads: 2\n")
            .unwrap();

    assert_eq!(cfg.server.listen_addr, "0.0.0.0:9000");
    assert_eq!(cfg.server.worker_threads, 2);
}

#[test]
fn test_config_yaml_partial_fields_fall_back_to_defaults() {
    let cfg = Config::from_yaml("server:\n  listen_addr: \"0.0.0.0:3000\"\n").unwrap();

    assert_eq!(cfg.server.listen_addr, "0.0.0.0:3000");
    assert_eq!(cfg.server.worker_threads, 4);
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::default();
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1.server.listen_addr, cfg2.server.listen_addr);
}

#[test]
fn test_config_invalid_yaml_is_error() {
    assert!(Config::from_yaml("server: [not, a, map").is_err());
}
