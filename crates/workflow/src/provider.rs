//! Provider type tables
//!
//! Wire strings for the access (credential) providers, the DNS providers used
//! to answer DNS-01 challenges, and the deploy targets. The part of a DNS or
//! deploy provider before the first `-` always names the access provider whose
//! credentials it uses.
//!
//! Keep the variants of each table in ASCII order of their wire strings.
//!
//! Strings not in a table are kept as `Other` so persisted workflows written
//! by newer versions still load and round-trip unchanged.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! provider_table {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
            /// Not in the table
            Other(String),
        }

        impl $name {
            /// Wire string
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $value,)+
                    $name::Other(value) => value,
                }
            }

            /// False for `Other`
            pub fn is_known(&self) -> bool {
                !matches!(self, $name::Other(_))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                match value {
                    $($value => $name::$variant,)+
                    other => $name::Other(other.to_string()),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::Other(String::new())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                Ok($name::from(value.as_str()))
            }
        }
    };
}

provider_table! {
    /// Credential ("access") providers
    AccessProviderType {
        AcmeHttpReq => "acmehttpreq",
        Aliyun => "aliyun",
        Aws => "aws",
        Azure => "azure",
        BaiduCloud => "baiducloud",
        BytePlus => "byteplus",
        Cloudflare => "cloudflare",
        DogeCloud => "dogecloud",
        Edgio => "edgio",
        GoDaddy => "godaddy",
        HuaweiCloud => "huaweicloud",
        Kubernetes => "k8s",
        Local => "local",
        NameDotCom => "namedotcom",
        NameSilo => "namesilo",
        Ns1 => "ns1",
        PowerDns => "powerdns",
        Qiniu => "qiniu",
        Ssh => "ssh",
        TencentCloud => "tencentcloud",
        UCloud => "ucloud",
        VolcEngine => "volcengine",
        Webhook => "webhook",
    }
}

provider_table! {
    /// DNS providers able to publish DNS-01 challenge records
    ApplyDnsProviderType {
        AcmeHttpReq => "acmehttpreq",
        /// Legacy spelling of `aliyun-dns`
        Aliyun => "aliyun",
        AliyunDns => "aliyun-dns",
        /// Legacy spelling of `aws-route53`
        Aws => "aws",
        AwsRoute53 => "aws-route53",
        AzureDns => "azure-dns",
        Cloudflare => "cloudflare",
        GoDaddy => "godaddy",
        /// Legacy spelling of `huaweicloud-dns`
        HuaweiCloud => "huaweicloud",
        HuaweiCloudDns => "huaweicloud-dns",
        NameDotCom => "namedotcom",
        NameSilo => "namesilo",
        Ns1 => "ns1",
        PowerDns => "powerdns",
        /// Legacy spelling of `tencentcloud-dns`
        TencentCloud => "tencentcloud",
        TencentCloudDns => "tencentcloud-dns",
        /// Legacy spelling of `volcengine-dns`
        VolcEngine => "volcengine",
        VolcEngineDns => "volcengine-dns",
    }
}

provider_table! {
    /// Deployment targets
    DeployProviderType {
        AliyunAlb => "aliyun-alb",
        AliyunCdn => "aliyun-cdn",
        AliyunClb => "aliyun-clb",
        AliyunDcdn => "aliyun-dcdn",
        AliyunLive => "aliyun-live",
        AliyunNlb => "aliyun-nlb",
        AliyunOss => "aliyun-oss",
        BaiduCloudCdn => "baiducloud-cdn",
        BytePlusCdn => "byteplus-cdn",
        DogeCloudCdn => "dogecloud-cdn",
        EdgioApplications => "edgio-applications",
        HuaweiCloudCdn => "huaweicloud-cdn",
        HuaweiCloudElb => "huaweicloud-elb",
        KubernetesSecret => "k8s-secret",
        Local => "local",
        QiniuCdn => "qiniu-cdn",
        Ssh => "ssh",
        TencentCloudCdn => "tencentcloud-cdn",
        TencentCloudClb => "tencentcloud-clb",
        TencentCloudCos => "tencentcloud-cos",
        TencentCloudCss => "tencentcloud-css",
        TencentCloudEcdn => "tencentcloud-ecdn",
        TencentCloudEo => "tencentcloud-eo",
        UCloudUcdn => "ucloud-ucdn",
        UCloudUs3 => "ucloud-us3",
        VolcEngineCdn => "volcengine-cdn",
        VolcEngineClb => "volcengine-clb",
        VolcEngineDcdn => "volcengine-dcdn",
        VolcEngineLive => "volcengine-live",
        VolcEngineTos => "volcengine-tos",
        Webhook => "webhook",
    }
}

fn access_provider_of(value: &str) -> AccessProviderType {
    let prefix = value.split('-').next().unwrap_or(value);
    AccessProviderType::from(prefix)
}

impl ApplyDnsProviderType {
    /// Map legacy spellings onto their current names
    pub fn canonical(&self) -> ApplyDnsProviderType {
        match self {
            ApplyDnsProviderType::Aliyun => ApplyDnsProviderType::AliyunDns,
            ApplyDnsProviderType::Aws => ApplyDnsProviderType::AwsRoute53,
            ApplyDnsProviderType::HuaweiCloud => ApplyDnsProviderType::HuaweiCloudDns,
            ApplyDnsProviderType::TencentCloud => ApplyDnsProviderType::TencentCloudDns,
            ApplyDnsProviderType::VolcEngine => ApplyDnsProviderType::VolcEngineDns,
            other => other.clone(),
        }
    }

    /// Access provider whose credentials this DNS provider uses
    pub fn access_provider(&self) -> AccessProviderType {
        access_provider_of(self.as_str())
    }
}

impl DeployProviderType {
    /// Access provider whose credentials this deploy target uses
    pub fn access_provider(&self) -> AccessProviderType {
        access_provider_of(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_dns_aliases() {
        assert_eq!(
            ApplyDnsProviderType::from("aliyun").canonical(),
            ApplyDnsProviderType::AliyunDns
        );
        assert_eq!(
            ApplyDnsProviderType::from("aws").canonical(),
            ApplyDnsProviderType::AwsRoute53
        );
        assert_eq!(
            ApplyDnsProviderType::from("cloudflare").canonical(),
            ApplyDnsProviderType::Cloudflare
        );
    }

    #[test]
    fn test_access_provider_prefix() {
        assert_eq!(
            ApplyDnsProviderType::AwsRoute53.access_provider(),
            AccessProviderType::Aws
        );
        assert_eq!(
            DeployProviderType::KubernetesSecret.access_provider(),
            AccessProviderType::Kubernetes
        );
        assert_eq!(
            DeployProviderType::Local.access_provider(),
            AccessProviderType::Local
        );
    }

    #[test]
    fn test_unknown_strings_round_trip() {
        let provider: DeployProviderType = serde_json::from_str("\"gcore-cdn\"").unwrap();
        assert_eq!(provider, DeployProviderType::Other("gcore-cdn".to_string()));
        assert!(!provider.is_known());
        assert_eq!(serde_json::to_string(&provider).unwrap(), "\"gcore-cdn\"");
    }

    #[test]
    fn test_known_strings() {
        let provider: AccessProviderType = serde_json::from_str("\"k8s\"").unwrap();
        assert_eq!(provider, AccessProviderType::Kubernetes);
        assert!(provider.is_known());
        assert_eq!(provider.to_string(), "k8s");
    }
}
