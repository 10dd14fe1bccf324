// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use dms_master::api;
use dms_master::bootstrap::Services;
use dms_master::config::DmsMasterConfig;
use poem::listener::TcpListener;
use poem::middleware::CookieJarManager;
use poem::EndpointExt;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> Result<(), std::io::Error> {
    if std::env::args().any(|arg| arg == "--dump-openapi-yaml") {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(dump_openapi_yaml())
    } else {
        let config = DmsMasterConfig::load().map_err(std::io::Error::other)?;
        init_tracing(&config.tracing_filter);
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(async_main(config))
    }
}

fn init_tracing(filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn dump_openapi_yaml() -> Result<(), std::io::Error> {
    let config = DmsMasterConfig::default();
    let services = Services::new(&config).await.map_err(std::io::Error::other)?;
    let open_api_service = api::make_open_api_service(&services);
    println!("{}", open_api_service.spec_yaml());
    Ok(())
}

async fn async_main(config: DmsMasterConfig) -> Result<(), std::io::Error> {
    let http_port = config.http_port;
    info!("Starting dms-master on port {}", http_port);

    let services = Services::new(&config).await.map_err(|e| {
        error!("Services - init error: {}", e);
        std::io::Error::other(e)
    })?;

    let app = api::combined_routes(&services).with(CookieJarManager::new());

    poem::Server::new(TcpListener::bind(format!("0.0.0.0:{}", http_port)))
        .run(app)
        .await
}
