macro_rules! ip_channel {
    ($name:expr, $url:expr) => {
        IpChannel {
            name: $name.to_string(),
            url: url::Url::parse($url).unwrap(),
        }
    };
}

macro_rules! simulator {
    ($yaml:expr) => {{
        let config: crate::config::SimulatorConfig = serde_yaml::from_str($yaml).unwrap();
        crate::simulator::SimulatedMiddleware::new(&config).unwrap()
    }};
}
