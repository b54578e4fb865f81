#![doc = r#"
Web-services transport for `recordkit`.

| Boundary primitive | HTTP route |
| --- | --- |
| `RemoteContainer::account_status` | `GET users/caller` (401 reports `NoAccount`) |
| `RemoteContainer::request_permission` | `GET users/caller` (`isDiscoverable`) |
| `RemoteContainer::fetch_user_record_id` | `GET users/caller` |
| `RemoteContainer::discover_user_identity` | `POST users/discover` |
| `RemoteDatabase::perform_query` | `POST records/query` |
| `RemoteDatabase::fetch_record` | `POST records/lookup` |
| `RemoteDatabase::save_record` | `POST records/modify` (`create` / `forceUpdate`) |
| `RemoteDatabase::delete_record` | `POST records/modify` (`forceDelete`) |
| `RemoteDatabase::save_subscription` | `POST subscriptions/modify` (`create`) |
| `RemoteDatabase::delete_subscription` | `POST subscriptions/modify` (`delete`) |

Routes live under `{endpoint}/database/1/{container}/{environment}/{scope}/`.
User routes always use the public scope. The API token, when configured, is
sent as the `ckAPIToken` query parameter.
"#]

pub mod client;
pub mod wire;

pub use client::{WebClientError, WebServiceClient};
