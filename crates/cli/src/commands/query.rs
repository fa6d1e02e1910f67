use crate::di;
use doqd_domain::Config;
use doqd_infrastructure::dns::codec::{build_query, decode_message};
use doqd_infrastructure::doq::DoqClient;
use hickory_proto::op::Message;

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub name: String,
    pub record_type: String,
    pub recursion_desired: bool,
    pub dnssec: bool,
}

pub async fn run(config: &Config, request: &QueryRequest) -> anyhow::Result<()> {
    let wire = build_query(
        &request.name,
        &request.record_type,
        request.recursion_desired,
        request.dnssec,
    )?;

    let client = DoqClient::connect(&di::client_settings(&config.client)).await?;
    let protocol = client.negotiated_protocol();
    let result = client.send_raw(&wire).await;
    client.close().await;

    let response = decode_message(&result?)?;
    print!(
        "{}",
        render_response(&response, protocol.as_deref().unwrap_or("none"))
    );
    Ok(())
}

fn render_response(response: &Message, protocol: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        ";; protocol: {}, id: {}, status: {}\n",
        protocol,
        response.id(),
        response.response_code()
    ));

    let sections = [
        ("ANSWER", response.answers()),
        ("AUTHORITY", response.name_servers()),
        ("ADDITIONAL", response.additionals()),
    ];
    for (title, records) in sections {
        if records.is_empty() {
            continue;
        }
        out.push_str(&format!("\n;; {} SECTION:\n", title));
        for record in records {
            out.push_str(&format!("{}\n", record));
        }
    }

    out
}
